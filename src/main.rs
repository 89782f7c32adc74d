use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use sense8::audio::{AudioCapture, AudioPlayback, calculate_energy, decode_mp3};
use sense8::detection::{
    DetectionAnnouncer, Detector, DirectoryFrameSource, FrameAnalyzer, FrameSource, VisionDetector,
    capture,
};
use sense8::navigation::{
    DirectionsClient, DirectionsProvider, Geocoder, GoogleGeocoder, LocationSource,
    ProximityEngine, ReplayLocationSource,
};
use sense8::speech::{
    CloudRecognizer, CloudSynthesizer, ConsoleSynthesizer, SpeechRecognizer, SpeechSynthesizer,
    SpeechToText, StdinRecognizer, TextToSpeech,
};
use sense8::{Backends, Config, Daemon, LatLng, db, polyline};

/// How long `detect` waits for the next result before giving up
const DETECT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Sense8 - voice-guided object detection and navigation
#[derive(Parser)]
#[command(name = "sense8", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable microphone and speaker; read commands from stdin, print speech
    #[arg(long, env = "SENSE8_DISABLE_VOICE")]
    disable_voice: bool,

    /// Directory of images to use as the camera stream
    #[arg(long, env = "SENSE8_FRAMES_DIR")]
    frames_dir: Option<PathBuf>,

    /// Camera frames per second when replaying a directory
    #[arg(long, default_value = "1.0")]
    fps: f32,

    /// JSON-lines file of GPS fixes to use as the location stream
    #[arg(long, env = "SENSE8_GPS_REPLAY")]
    gps_replay: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the Sense8 voice.")]
        text: String,
    },
    /// Decode an encoded polyline and print its coordinates
    DecodePolyline {
        encoded: String,
    },
    /// Fetch and print directions between two `lat,lng` points
    Directions {
        origin: LatLng,
        destination: LatLng,
    },
    /// Replay GPS fixes against a route and print the spoken guidance
    Navigate {
        /// Destination as `lat,lng` or a place name
        destination: String,
        /// JSON-lines GPS fixes; the first fix is the origin
        #[arg(long)]
        gps: PathBuf,
    },
    /// Run object detection over a directory of images
    Detect {
        dir: PathBuf,
        /// Confidence threshold (defaults to the configured value)
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Save each analyzed frame with its boxes drawn into this directory
        #[arg(long)]
        save_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,sense8=info",
        1 => "info,sense8=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(mut cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command.take() {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
            Command::DecodePolyline { encoded } => decode_polyline(&encoded),
            Command::Directions {
                origin,
                destination,
            } => print_directions(origin, destination).await,
            Command::Navigate { destination, gps } => navigate(&destination, &gps).await,
            Command::Detect {
                dir,
                threshold,
                save_dir,
            } => detect(&dir, threshold, save_dir.as_deref()).await,
        };
    }

    tracing::info!(disable_voice = cli.disable_voice, "starting sense8");

    let config = Config::load_with_options(cli.disable_voice)?;
    tracing::debug!(?config, "loaded configuration");

    let db_path = config.db_path();
    let pool = db::init(&db_path)?;
    tracing::info!(path = %db_path.display(), "database initialized");

    let backends = build_backends(&config, &cli)?;
    let daemon = Daemon::new(config, pool, backends)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_tx.send_replace(true);
        }
    });

    tracing::info!("sense8 ready - say \"navigation\" or \"object detection\"");
    daemon.run(shutdown_rx).await?;

    Ok(())
}

fn build_backends(config: &Config, cli: &Cli) -> anyhow::Result<Backends> {
    let (recognizer, synthesizer): (Box<dyn SpeechRecognizer>, Arc<dyn SpeechSynthesizer>) =
        if config.voice.enabled {
            let key = config.api_keys.openai.clone().unwrap_or_default();
            let stt = SpeechToText::new(
                key.clone(),
                config.endpoints.openai.clone(),
                config.voice.stt_model.clone(),
            )?;
            let tts = TextToSpeech::new(key, config.endpoints.openai.clone(), &config.voice)?;
            (
                Box::new(CloudRecognizer::new(
                    stt,
                    Duration::from_secs(config.voice.listen_timeout_secs),
                )),
                Arc::new(CloudSynthesizer::new(tts, AudioPlayback::new()?)),
            )
        } else {
            tracing::info!("voice disabled - reading commands from stdin");
            (
                Box::new(StdinRecognizer::new()),
                Arc::new(ConsoleSynthesizer),
            )
        };

    let detector: Option<Arc<dyn Detector>> = match &config.api_keys.anthropic {
        Some(key) if !key.is_empty() => Some(Arc::new(VisionDetector::new(
            key.clone(),
            config.endpoints.anthropic.clone(),
            config.detection.vision_model.clone(),
        )?)),
        _ => {
            tracing::warn!("ANTHROPIC_API_KEY not set - object detection unavailable");
            None
        }
    };

    let frames: Option<Arc<dyn FrameSource>> = match &cli.frames_dir {
        Some(dir) => Some(Arc::new(
            DirectoryFrameSource::new(dir, cli.fps)?.repeating(true),
        )),
        None => None,
    };

    let location: Option<Arc<dyn LocationSource>> = match &cli.gps_replay {
        Some(path) => Some(Arc::new(ReplayLocationSource::from_file(
            path,
            Duration::from_millis(config.navigation.location_interval_ms),
        )?)),
        None => None,
    };

    let (geocoder, directions): (Option<Arc<dyn Geocoder>>, Option<Arc<dyn DirectionsProvider>>) =
        match config.require_maps_key() {
            Ok(key) => (
                Some(Arc::new(GoogleGeocoder::new(
                    key.to_string(),
                    config.endpoints.maps.clone(),
                )?)),
                Some(Arc::new(DirectionsClient::new(
                    key.to_string(),
                    config.endpoints.maps.clone(),
                )?)),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "navigation unavailable");
                (None, None)
            }
        };

    Ok(Backends {
        recognizer,
        synthesizer,
        detector,
        frames,
        location,
        geocoder,
        directions,
    })
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let readings = tokio::task::spawn_blocking(move || -> sense8::Result<Vec<(f32, f32)>> {
        let mut capture = AudioCapture::new()?;
        capture.start()?;
        let mut readings = Vec::new();
        for _ in 0..duration {
            std::thread::sleep(Duration::from_secs(1));
            let samples = capture.take_buffer();
            let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
            readings.push((calculate_energy(&samples), peak));
        }
        capture.stop();
        Ok(readings)
    })
    .await??;

    for (i, (energy, peak)) in readings.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);
        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    println!("\n---");
    println!("If RMS rose while you spoke, your mic is working!");
    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = 24000_u16;
    let frequency = 440.0_f32;
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..u32::from(sample_rate) * 2)
        .map(|i| {
            let t = i as f32 / f32::from(sample_rate);
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {sample_rate} Hz...", samples.len());
    tokio::task::spawn_blocking(move || playback.play_blocking(samples, &AtomicBool::new(false)))
        .await??;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    Ok(())
}

/// Test TTS output
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let tts = TextToSpeech::new(
        config.api_keys.openai.clone().unwrap_or_default(),
        config.endpoints.openai.clone(),
        &config.voice,
    )?;

    println!("Synthesizing speech...");
    let mp3 = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3.len());

    let samples = decode_mp3(&mp3)?;
    let playback = AudioPlayback::new()?;
    println!("Playing audio...");
    tokio::task::spawn_blocking(move || playback.play_blocking(samples, &AtomicBool::new(false)))
        .await??;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");
    Ok(())
}

fn decode_polyline(encoded: &str) -> anyhow::Result<()> {
    for point in polyline::decode(encoded)? {
        println!("{:.5},{:.5}", point.lat, point.lng);
    }
    Ok(())
}

fn maps_clients(config: &Config) -> anyhow::Result<(GoogleGeocoder, DirectionsClient)> {
    let key = config.require_maps_key()?.to_string();
    Ok((
        GoogleGeocoder::new(key.clone(), config.endpoints.maps.clone())?,
        DirectionsClient::new(key, config.endpoints.maps.clone())?,
    ))
}

async fn print_directions(origin: LatLng, destination: LatLng) -> anyhow::Result<()> {
    let config = Config::load()?;
    let (_, client) = maps_clients(&config)?;

    let Some(directions) = client.fetch(origin, destination).await? else {
        println!("No route found.");
        return Ok(());
    };

    println!("ETA: {}", directions.eta);
    for (i, step) in directions.steps.iter().enumerate() {
        let end = step
            .end_point()
            .map_or_else(String::new, |p| p.to_string());
        println!("{:2}. {} -> {end}", i + 1, step.instruction);
    }
    Ok(())
}

async fn navigate(destination: &str, gps: &Path) -> anyhow::Result<()> {
    let config = Config::load()?;
    let (geocoder, client) = maps_clients(&config)?;

    let replay = ReplayLocationSource::from_file(gps, Duration::ZERO)?;
    let origin = *replay
        .fixes()
        .first()
        .ok_or_else(|| anyhow::anyhow!("{} has no fixes", gps.display()))?;

    let target = match destination.parse::<LatLng>() {
        Ok(point) => point,
        Err(_) => geocoder
            .geocode(destination)
            .await?
            .ok_or_else(|| anyhow::anyhow!("location not found: {destination}"))?,
    };

    let directions = client
        .fetch(origin, target)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no route from {origin} to {target}"))?;
    println!("Route ready, ETA {}, {} steps", directions.eta, directions.steps.len());

    let mut engine = ProximityEngine::new(config.navigation.arrival_radius_m);
    engine.set_route(directions.steps);

    for fix in replay.fixes() {
        for utterance in engine.on_location(*fix) {
            println!("{fix}  \"{}\"", utterance.text);
        }
    }

    match engine.current_step() {
        Some(step) => println!(
            "Stopped before step {} of {}: {}",
            engine.current_index() + 1,
            engine.step_count(),
            step.instruction
        ),
        None => println!("Arrived after {} steps", engine.step_count()),
    }
    Ok(())
}

async fn detect(
    dir: &Path,
    threshold: Option<f32>,
    save_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let key = config.api_keys.anthropic.clone().unwrap_or_default();
    let detector = Arc::new(VisionDetector::new(
        key,
        config.endpoints.anthropic.clone(),
        config.detection.vision_model.clone(),
    )?);
    let source = DirectoryFrameSource::new(dir, 1.0)?;
    let total = source.len();

    let (tx, mut rx) = mpsc::channel(4);
    let analyzer = FrameAnalyzer::spawn(
        detector,
        threshold.unwrap_or(config.detection.confidence_threshold),
        tx,
    );
    let producer = source.start(analyzer.submitter());

    let mut announcer = DetectionAnnouncer::new();
    while let Ok(Some(set)) = tokio::time::timeout(DETECT_IDLE_TIMEOUT, rx.recv()).await {
        println!("[{}] {} object(s)", set.timestamp, set.detections.len());
        for d in &set.detections {
            let b = d.bounding_box;
            println!(
                "    {:<20} {:.2}  ({:.0},{:.0})-({:.0},{:.0})",
                d.label, d.confidence, b.left, b.top, b.right, b.bottom
            );
        }
        if let Some(u) = announcer.observe(&set.detections) {
            println!("    \"{}\"", u.text);
        }
        if let Some(save_dir) = save_dir {
            let path = capture::save(&set, save_dir)?;
            println!("    saved {}", path.display());
        }
        if producer.is_finished()
            && analyzer.analyzed_frames() + analyzer.dropped_frames() >= total as u64
        {
            break;
        }
    }

    println!(
        "Analyzed {} frame(s), dropped {}",
        analyzer.analyzed_frames(),
        analyzer.dropped_frames()
    );
    analyzer.close().await;
    Ok(())
}

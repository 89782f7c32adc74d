//! Voice pipeline integration tests
//!
//! Tests the command router and utterance segmentation without requiring
//! audio hardware

use std::io::Cursor;
use std::sync::atomic::Ordering;
use std::time::Duration;

use sense8::audio::{SAMPLE_RATE, SegmentStatus, UtteranceSegmenter, samples_to_wav};
use sense8::speech::{RecognitionEvent, SpeechQueue, tags};
use sense8::voice::{
    BackoffPolicy, ListenMode, ListenerState, REPROMPT, RouterEvent, RouterSettings,
    VoiceCommand, VoiceCommandRouter,
};
use tokio::sync::{mpsc, watch};

mod common;
use common::{ScriptedRecognizer, drain, texts};

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, count: usize, amplitude: f32) -> Vec<f32> {
    (0..count)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

fn settings() -> RouterSettings {
    RouterSettings {
        reprompt_delay: Duration::from_secs(1),
        backoff: BackoffPolicy::default(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_router_publishes_commands_and_reprompts() {
    let recognizer = ScriptedRecognizer::new([
        RecognitionEvent::Result("Navigation".into()),
        RecognitionEvent::Result("banana".into()),
        RecognitionEvent::NoMatch,
        RecognitionEvent::Result(" object detection ".into()),
    ]);
    let (speech, mut spoken) = SpeechQueue::channel();
    let (_mode_tx, mode_rx) = watch::channel(ListenMode::Commands);
    let (events_tx, mut events) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let router = tokio::spawn(
        VoiceCommandRouter::new(recognizer, speech, settings(), mode_rx, events_tx)
            .run(shutdown_rx),
    );

    assert_eq!(
        events.recv().await,
        Some(RouterEvent::Command(VoiceCommand::Navigation))
    );
    assert_eq!(
        events.recv().await,
        Some(RouterEvent::Unrecognized("banana".into()))
    );
    assert_eq!(
        events.recv().await,
        Some(RouterEvent::Command(VoiceCommand::ObjectDetection))
    );

    let reprompts = drain(&mut spoken);
    assert_eq!(texts(&reprompts), vec![REPROMPT.to_string(), REPROMPT.to_string()]);
    assert!(reprompts.iter().all(|u| u.tag == Some(tags::RETRY_PROMPT)));

    shutdown_tx.send(true).unwrap();
    let machine = router.await.unwrap();
    assert_eq!(machine.state(), ListenerState::Stopped);
    assert_eq!(machine.cycles(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_router_rearms_after_every_outcome() {
    let recognizer = ScriptedRecognizer::new([
        RecognitionEvent::NoMatch,
        RecognitionEvent::EndOfSpeech,
        RecognitionEvent::Error("recognizer busy".into()),
        RecognitionEvent::Error("recognizer busy".into()),
        RecognitionEvent::Result("navigation".into()),
    ]);
    let listens = recognizer.listen_count();
    let (speech, _spoken) = SpeechQueue::channel();
    let (_mode_tx, mode_rx) = watch::channel(ListenMode::Commands);
    let (events_tx, mut events) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let started = tokio::time::Instant::now();

    let router = tokio::spawn(
        VoiceCommandRouter::new(recognizer, speech, settings(), mode_rx, events_tx)
            .run(shutdown_rx),
    );

    assert_eq!(
        events.recv().await,
        Some(RouterEvent::Command(VoiceCommand::Navigation))
    );

    // One reprompt pause plus two exponential backoffs
    let policy = BackoffPolicy::default();
    let minimum =
        Duration::from_secs(1) + policy.delay_for_attempt(0) + policy.delay_for_attempt(1);
    assert!(started.elapsed() >= minimum, "elapsed {:?}", started.elapsed());

    shutdown_tx.send(true).unwrap();
    let machine = router.await.unwrap();
    assert_eq!(machine.cycles(), 5);
    // A sixth cycle was armed and then torn down
    assert_eq!(listens.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn test_free_form_mode_passes_destinations_through() {
    let recognizer = ScriptedRecognizer::new([
        RecognitionEvent::Result("coffee shop".into()),
        RecognitionEvent::NoMatch,
        RecognitionEvent::Result("object detection".into()),
    ]);
    let (speech, mut spoken) = SpeechQueue::channel();
    let (_mode_tx, mode_rx) = watch::channel(ListenMode::FreeForm);
    let (events_tx, mut events) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let router = tokio::spawn(
        VoiceCommandRouter::new(recognizer, speech, settings(), mode_rx, events_tx)
            .run(shutdown_rx),
    );

    assert_eq!(
        events.recv().await,
        Some(RouterEvent::Utterance("coffee shop".into()))
    );
    assert_eq!(
        events.recv().await,
        Some(RouterEvent::Command(VoiceCommand::ObjectDetection))
    );
    assert!(drain(&mut spoken).is_empty());

    shutdown_tx.send(true).unwrap();
    router.await.unwrap();
}

#[tokio::test]
async fn test_router_stops_when_listener_is_dropped() {
    let recognizer = ScriptedRecognizer::saying(&["navigation", "object detection"]);
    let (speech, _spoken) = SpeechQueue::channel();
    let (_mode_tx, mode_rx) = watch::channel(ListenMode::Commands);
    let (events_tx, events) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    drop(events);

    let machine = VoiceCommandRouter::new(recognizer, speech, settings(), mode_rx, events_tx)
        .run(shutdown_rx)
        .await;

    assert_eq!(machine.state(), ListenerState::Stopped);
    assert_eq!(machine.cycles(), 1);
}

#[tokio::test]
async fn test_router_does_not_listen_after_shutdown() {
    let recognizer = ScriptedRecognizer::saying(&["navigation"]);
    let listens = recognizer.listen_count();
    let (speech, _spoken) = SpeechQueue::channel();
    let (_mode_tx, mode_rx) = watch::channel(ListenMode::Commands);
    let (events_tx, _events) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = watch::channel(true);

    let machine = VoiceCommandRouter::new(recognizer, speech, settings(), mode_rx, events_tx)
        .run(shutdown_rx)
        .await;

    assert_eq!(machine.state(), ListenerState::Stopped);
    assert_eq!(listens.load(Ordering::SeqCst), 0);
}

#[test]
fn test_segmenter_completes_after_trailing_silence() {
    let mut segmenter = UtteranceSegmenter::new();

    let speech = generate_sine_samples(440.0, 8000, 0.5);
    for chunk in speech.chunks(1600) {
        assert_eq!(segmenter.process(chunk), SegmentStatus::InProgress);
    }

    let silence = vec![0.0; 9000];
    let mut last = SegmentStatus::InProgress;
    for chunk in silence.chunks(1000) {
        last = segmenter.process(chunk);
    }
    assert_eq!(last, SegmentStatus::Complete);
    assert_eq!(segmenter.take_utterance().len(), 17_000);
}

#[test]
fn test_segmenter_discards_noise_burst() {
    let mut segmenter = UtteranceSegmenter::new();

    assert_eq!(
        segmenter.process(&generate_sine_samples(440.0, 1600, 0.5)),
        SegmentStatus::InProgress
    );

    let silence = vec![0.0; 9000];
    let mut last = SegmentStatus::InProgress;
    for chunk in silence.chunks(1000) {
        last = segmenter.process(chunk);
    }
    assert_eq!(last, SegmentStatus::Waiting);
    assert!(segmenter.take_utterance().is_empty());
}

#[test]
fn test_segmenter_ignores_silence() {
    let mut segmenter = UtteranceSegmenter::new();
    assert_eq!(segmenter.process(&[0.0; 1600]), SegmentStatus::Waiting);
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, SAMPLE_RATE as usize / 10, 0.5);
    let wav_bytes = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    let reader = hound::WavReader::new(Cursor::new(wav_bytes)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len() as usize, samples.len());
}

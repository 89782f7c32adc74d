//! Daemon integration tests
//!
//! Runs the whole app loop with scripted speech input and fake platform
//! backends.

use std::sync::Arc;
use std::time::Duration;

use sense8::daemon::{DETECTION_UNAVAILABLE, WELCOME_BACK, WELCOME_FIRST_LAUNCH};
use sense8::navigation::{LocationSource, ReplayLocationSource, messages};
use sense8::permissions::PermissionState;
use sense8::voice::REPROMPT;
use sense8::{Backends, Config, Daemon, DbPool, LatLng, Screen};
use tokio::sync::watch;

mod common;
use common::{
    FakeDetector, FakeDirections, FakeGeocoder, FakeRoute, RecordingSynthesizer,
    ScriptedRecognizer, northbound_route, setup_test_db,
};

const ORIGIN: LatLng = LatLng::new(40.7580, -73.9855);

const CAMERA_DENIED: &str = "The camera permission was denied. Please enable it in settings.";

fn test_config() -> Config {
    let mut config = Config::default();
    config.voice.reprompt_delay_ms = 100;
    config
}

fn backends(
    phrases: &[&str],
    synthesizer: Arc<RecordingSynthesizer>,
    location: bool,
) -> Backends {
    let destination = ORIGIN.offset_north(300.0);
    let route = northbound_route(ORIGIN, &["Head north on 7th Ave"], 300.0);
    Backends {
        recognizer: Box::new(
            ScriptedRecognizer::saying(phrases).with_pause(Duration::from_secs(2)),
        ),
        synthesizer,
        detector: Some(Arc::new(FakeDetector::with_labels(&["person"]))),
        frames: None,
        location: location.then(|| {
            Arc::new(ReplayLocationSource::new(vec![ORIGIN], Duration::from_secs(1)))
                as Arc<dyn LocationSource>
        }),
        geocoder: Some(Arc::new(
            FakeGeocoder::default().with_place("coffee shop", destination),
        )),
        directions: Some(Arc::new(FakeDirections::new(FakeRoute::Route(route)))),
    }
}

/// Run a daemon until `last` has been spoken, then shut it down
async fn run_until_spoken(
    config: Config,
    db: DbPool,
    backends: Backends,
    synthesizer: &RecordingSynthesizer,
    last: &str,
) -> Screen {
    run_until_spoken_times(config, db, backends, synthesizer, last, 1).await
}

/// Run a daemon until `last` has been spoken `times` times, then shut it down
async fn run_until_spoken_times(
    config: Config,
    db: DbPool,
    backends: Backends,
    synthesizer: &RecordingSynthesizer,
    last: &str,
    times: usize,
) -> Screen {
    let daemon = Daemon::new(config, db, backends).unwrap();
    let screen = daemon.subscribe_screen();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(daemon.run(shutdown_rx));

    assert!(
        synthesizer.wait_for_times(last, times).await,
        "never spoke {last:?} {times} times; spoke {:?}",
        synthesizer.spoken()
    );

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("daemon did not stop")
        .unwrap()
        .unwrap();
    *screen.borrow()
}

/// Assert `expected` appears in `spoken` in order
fn assert_in_order(spoken: &[String], expected: &[&str]) {
    let mut rest = spoken.iter();
    for want in expected {
        assert!(
            rest.any(|s| s == want),
            "missing {want:?} in order; spoke {spoken:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_voice_flow_switches_screens_and_routes() {
    let synthesizer = Arc::new(RecordingSynthesizer::default());
    let backends = backends(
        &["banana", "object detection", "navigation", "coffee shop"],
        synthesizer.clone(),
        true,
    );

    let screen = run_until_spoken(
        test_config(),
        setup_test_db(),
        backends,
        &synthesizer,
        &messages::route_ready("5 mins"),
    )
    .await;

    assert_eq!(screen, Screen::Navigation);
    assert_in_order(
        &synthesizer.spoken(),
        &[
            WELCOME_FIRST_LAUNCH,
            REPROMPT,
            messages::PROMPT_DESTINATION,
            &messages::searching("coffee shop"),
            &messages::found("coffee shop"),
            &messages::route_ready("5 mins"),
        ],
    );
}

#[tokio::test(start_paused = true)]
async fn test_welcome_back_on_second_launch() {
    let db = setup_test_db();

    let first = Arc::new(RecordingSynthesizer::default());
    run_until_spoken(
        test_config(),
        db.clone(),
        backends(&[], first.clone(), false),
        &first,
        WELCOME_FIRST_LAUNCH,
    )
    .await;

    let second = Arc::new(RecordingSynthesizer::default());
    let screen = run_until_spoken(
        test_config(),
        db,
        backends(&[], second.clone(), false),
        &second,
        WELCOME_BACK,
    )
    .await;

    assert_eq!(screen, Screen::Waiting);
    assert!(!second.spoken().iter().any(|s| s == WELCOME_FIRST_LAUNCH));
}

#[tokio::test(start_paused = true)]
async fn test_destination_without_fix_asks_to_wait() {
    let synthesizer = Arc::new(RecordingSynthesizer::default());
    let backends = backends(&["navigation", "coffee shop"], synthesizer.clone(), false);

    let screen = run_until_spoken(
        test_config(),
        setup_test_db(),
        backends,
        &synthesizer,
        messages::WAITING_FOR_LOCATION,
    )
    .await;

    assert_eq!(screen, Screen::Navigation);
    assert!(!synthesizer.spoken().iter().any(|s| s == &messages::found("coffee shop")));
}

#[tokio::test(start_paused = true)]
async fn test_denied_camera_keeps_pipeline_stopped() {
    let synthesizer = Arc::new(RecordingSynthesizer::default());
    let mut config = test_config();
    config.permissions.camera = PermissionState::PermanentlyDenied;
    let backends = backends(&["object detection"], synthesizer.clone(), false);

    let screen = run_until_spoken(
        config,
        setup_test_db(),
        backends,
        &synthesizer,
        CAMERA_DENIED,
    )
    .await;

    assert_eq!(screen, Screen::ObjectDetection);
}

#[tokio::test(start_paused = true)]
async fn test_denied_permission_is_spoken_on_every_attempt() {
    let synthesizer = Arc::new(RecordingSynthesizer::default());
    let mut config = test_config();
    config.permissions.camera = PermissionState::PermanentlyDenied;
    let backends = backends(
        &["object detection", "object detection"],
        synthesizer.clone(),
        false,
    );

    let screen = run_until_spoken_times(
        config,
        setup_test_db(),
        backends,
        &synthesizer,
        CAMERA_DENIED,
        2,
    )
    .await;

    assert_eq!(screen, Screen::ObjectDetection);
    assert_eq!(synthesizer.count(CAMERA_DENIED), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_screen_is_spoken_on_every_attempt() {
    let synthesizer = Arc::new(RecordingSynthesizer::default());
    let mut backends = backends(
        &["object detection", "object detection"],
        synthesizer.clone(),
        false,
    );
    backends.detector = None;

    let screen = run_until_spoken_times(
        test_config(),
        setup_test_db(),
        backends,
        &synthesizer,
        DETECTION_UNAVAILABLE,
        2,
    )
    .await;

    assert_eq!(screen, Screen::ObjectDetection);
    assert_eq!(synthesizer.count(DETECTION_UNAVAILABLE), 2);
}

//! Shared test utilities
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc as std_mpsc};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Notify, mpsc};

use sense8::detection::{BoundingBox, Detection, Detector, Frame};
use sense8::navigation::{Directions, DirectionsProvider, Geocoder, RouteStep};
use sense8::speech::{RecognitionEvent, SpeechRecognizer, SpeechSynthesizer, Utterance};
use sense8::{DbPool, Error, LatLng, Result, db};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Drain every utterance posted so far
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Utterance>) -> Vec<Utterance> {
    let mut out = Vec::new();
    while let Ok(u) = rx.try_recv() {
        out.push(u);
    }
    out
}

/// Texts of posted utterances
pub fn texts(utterances: &[Utterance]) -> Vec<String> {
    utterances.iter().map(|u| u.text.clone()).collect()
}

/// Synthesizer that records each utterance instantly
#[derive(Default)]
pub struct RecordingSynthesizer {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSynthesizer {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    /// Wait until `text` has been spoken
    pub async fn wait_for(&self, text: &str) -> bool {
        self.wait_for_times(text, 1).await
    }

    /// Wait until `text` has been spoken at least `times` times
    pub async fn wait_for_times(&self, text: &str, times: usize) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
        while tokio::time::Instant::now() < deadline {
            if self.count(text) >= times {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    /// How many times `text` has been spoken
    pub fn count(&self, text: &str) -> usize {
        self.spoken().iter().filter(|s| *s == text).count()
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSynthesizer {
    async fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Recognizer that replays scripted events, then waits forever
pub struct ScriptedRecognizer {
    events: VecDeque<RecognitionEvent>,
    listens: Arc<AtomicUsize>,
    pause: Duration,
}

impl ScriptedRecognizer {
    pub fn new(events: impl IntoIterator<Item = RecognitionEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            listens: Arc::new(AtomicUsize::new(0)),
            pause: Duration::ZERO,
        }
    }

    /// Wait `pause` before each scripted event, like a user thinking
    pub const fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Utterances recognized in order
    pub fn saying(phrases: &[&str]) -> Self {
        Self::new(
            phrases
                .iter()
                .map(|p| RecognitionEvent::Result((*p).to_string())),
        )
    }

    /// Counter of listening cycles started
    pub fn listen_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.listens)
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn listen(&mut self) -> RecognitionEvent {
        self.listens.fetch_add(1, Ordering::SeqCst);
        match self.events.pop_front() {
            Some(event) => {
                if !self.pause.is_zero() {
                    tokio::time::sleep(self.pause).await;
                }
                event
            }
            None => std::future::pending().await,
        }
    }
}

/// Detector returning a fixed label list, or failing
pub struct FakeDetector {
    labels: Mutex<Vec<String>>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeDetector {
    pub fn with_labels(labels: &[&str]) -> Self {
        Self {
            labels: Mutex::new(labels.iter().map(ToString::to_string).collect()),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            labels: Mutex::new(Vec::new()),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_labels(&self, labels: &[&str]) {
        *self.labels.lock().unwrap() = labels.iter().map(ToString::to_string).collect();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for FakeDetector {
    /// Every label scores 0.9 and boxes the frame's top-left quarter
    fn detect(&self, frame: &Frame, threshold: f32) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Inference("fake failure".to_string()));
        }
        #[allow(clippy::cast_precision_loss)]
        let (w, h) = (frame.width as f32, frame.height as f32);
        Ok(self
            .labels
            .lock()
            .unwrap()
            .iter()
            .map(|label| Detection {
                label: label.clone(),
                confidence: 0.9,
                bounding_box: BoundingBox::new(0.0, 0.0, w / 2.0, h / 2.0),
            })
            .filter(|d| d.confidence >= threshold)
            .collect())
    }
}

/// Detector that blocks inside `detect` until released, like a hung request
pub struct BlockingDetector {
    pub started: Notify,
    release: Mutex<std_mpsc::Receiver<()>>,
}

impl BlockingDetector {
    pub fn new() -> (Self, std_mpsc::Sender<()>) {
        let (tx, rx) = std_mpsc::channel();
        let detector = Self {
            started: Notify::new(),
            release: Mutex::new(rx),
        };
        (detector, tx)
    }
}

impl Detector for BlockingDetector {
    fn detect(&self, _frame: &Frame, _threshold: f32) -> Result<Vec<Detection>> {
        self.started.notify_one();
        let _ = self
            .release
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(10));
        Ok(Vec::new())
    }
}

/// A blank frame of the given size
pub fn test_frame(width: u32, height: u32) -> Frame {
    Frame {
        data: Vec::new(),
        mime_type: "image/jpeg".to_string(),
        width,
        height,
        rotation_degrees: 0,
        timestamp: Utc::now(),
    }
}

/// Geocoder backed by a fixed table
#[derive(Default)]
pub struct FakeGeocoder {
    places: HashMap<String, LatLng>,
    pub fail: bool,
}

impl FakeGeocoder {
    pub fn failing() -> Self {
        Self {
            places: HashMap::new(),
            fail: true,
        }
    }

    pub fn with_place(mut self, name: &str, at: LatLng) -> Self {
        self.places.insert(name.to_lowercase(), at);
        self
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<LatLng>> {
        if self.fail {
            return Err(Error::Geocoding("fake failure".to_string()));
        }
        Ok(self.places.get(&query.to_lowercase()).copied())
    }
}

/// Canned directions outcome
pub enum FakeRoute {
    Route(Directions),
    NoRoute,
    Fail,
}

/// Directions provider returning a canned outcome and recording requests
pub struct FakeDirections {
    route: FakeRoute,
    pub requests: Mutex<Vec<(LatLng, LatLng)>>,
}

impl FakeDirections {
    pub fn new(route: FakeRoute) -> Self {
        Self {
            route,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DirectionsProvider for FakeDirections {
    async fn fetch(&self, origin: LatLng, destination: LatLng) -> Result<Option<Directions>> {
        self.requests.lock().unwrap().push((origin, destination));
        match &self.route {
            FakeRoute::Route(d) => Ok(Some(d.clone())),
            FakeRoute::NoRoute => Ok(None),
            FakeRoute::Fail => Err(Error::Directions("fake failure".to_string())),
        }
    }
}

/// Route heading north from `origin`: one step per entry, each ending
/// `leg_m` meters past the previous
pub fn northbound_route(origin: LatLng, instructions: &[&str], leg_m: f64) -> Directions {
    let mut start = origin;
    let mut steps = Vec::new();
    let mut overview = vec![origin];
    for instruction in instructions {
        let end = start.offset_north(leg_m);
        steps.push(RouteStep {
            instruction: (*instruction).to_string(),
            polyline_points: vec![start, end],
        });
        overview.push(end);
        start = end;
    }
    Directions {
        eta: "5 mins".to_string(),
        steps,
        overview_polyline: overview,
    }
}

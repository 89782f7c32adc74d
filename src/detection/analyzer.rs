//! Latest-frame-wins inference loop

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

use super::{Detection, Detector, Frame};

/// Detections for one analyzed frame
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSet {
    pub timestamp: DateTime<Utc>,
    pub image_width: u32,
    pub image_height: u32,
    pub rotation_degrees: u16,
    /// Model output order
    pub detections: Vec<Detection>,
    /// Analyzed frame, kept for captures
    pub frame: Option<Arc<Frame>>,
}

struct Shared {
    pending: Mutex<Option<Frame>>,
    notify: Notify,
    closed: AtomicBool,
    /// `f32` bits
    threshold: AtomicU32,
    submitted: AtomicU64,
    dropped: AtomicU64,
    analyzed: AtomicU64,
}

impl Shared {
    fn threshold(&self) -> f32 {
        f32::from_bits(self.threshold.load(Ordering::Relaxed))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    fn submit(&self, frame: Frame) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.submitted.fetch_add(1, Ordering::Relaxed);

        let replaced = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(frame);
        if let Some(stale) = replaced {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::trace!(stale = %stale.timestamp, dropped, "pending frame replaced");
        }

        self.notify.notify_one();
        true
    }

    fn take_pending(&self) -> Option<Frame> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Cloneable handle for producers feeding frames to a [`FrameAnalyzer`]
#[derive(Clone)]
pub struct FrameSubmitter {
    shared: Arc<Shared>,
}

impl FrameSubmitter {
    /// Offer a frame; replaces any frame still waiting for analysis
    ///
    /// Returns `false` once the analyzer is closed.
    pub fn submit(&self, frame: Frame) -> bool {
        self.shared.submit(frame)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

/// Runs inference on the most recent frame, one at a time
///
/// Dropping the analyzer closes it; the worker exits after the frame in
/// flight.
pub struct FrameAnalyzer {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl FrameAnalyzer {
    /// Start the analysis worker
    pub fn spawn(
        detector: Arc<dyn Detector>,
        threshold: f32,
        results: mpsc::Sender<DetectionSet>,
    ) -> Self {
        let shared = Arc::new(Shared {
            pending: Mutex::new(None),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            threshold: AtomicU32::new(clamp_threshold(threshold).to_bits()),
            submitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            analyzed: AtomicU64::new(0),
        });

        let worker = tokio::spawn(run_worker(Arc::clone(&shared), detector, results));

        Self {
            shared,
            worker: Some(worker),
        }
    }

    #[must_use]
    pub fn submitter(&self) -> FrameSubmitter {
        FrameSubmitter {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Offer a frame; see [`FrameSubmitter::submit`]
    pub fn submit(&self, frame: Frame) -> bool {
        self.shared.submit(frame)
    }

    /// Change the confidence threshold used from the next inference on
    pub fn set_threshold(&self, threshold: f32) {
        let threshold = clamp_threshold(threshold);
        self.shared
            .threshold
            .store(threshold.to_bits(), Ordering::Relaxed);
        tracing::debug!(threshold, "confidence threshold changed");
    }

    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.shared.threshold()
    }

    /// Frames replaced before they were analyzed
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn analyzed_frames(&self) -> u64 {
        self.shared.analyzed.load(Ordering::Relaxed)
    }

    /// Close and stop the worker without waiting for the frame in flight
    ///
    /// A detector call that is already running finishes on its blocking
    /// thread and its result is discarded.
    pub async fn close(mut self) {
        self.shared.close();
        if let Some(worker) = self.worker.take() {
            worker.abort();
            if let Err(e) = worker.await
                && !e.is_cancelled()
            {
                tracing::warn!(error = %e, "frame analyzer worker failed");
            }
        }
    }
}

impl Drop for FrameAnalyzer {
    fn drop(&mut self) {
        self.shared.close();
        if let Some(worker) = &self.worker {
            worker.abort();
        }
    }
}

fn clamp_threshold(threshold: f32) -> f32 {
    if threshold.is_nan() {
        0.0
    } else {
        threshold.clamp(0.0, 1.0)
    }
}

async fn run_worker(
    shared: Arc<Shared>,
    detector: Arc<dyn Detector>,
    results: mpsc::Sender<DetectionSet>,
) {
    tracing::debug!("frame analyzer started");

    loop {
        let frame = loop {
            if shared.closed.load(Ordering::Acquire) {
                break None;
            }
            if let Some(frame) = shared.take_pending() {
                break Some(frame);
            }
            shared.notify.notified().await;
        };
        let Some(frame) = frame else { break };

        let threshold = shared.threshold();
        let timestamp = frame.timestamp;
        let (image_width, image_height) = (frame.width, frame.height);
        let rotation_degrees = frame.rotation_degrees;

        let detector = Arc::clone(&detector);
        let outcome = tokio::task::spawn_blocking(move || {
            let result = detector.detect(&frame, threshold);
            (frame, result)
        })
        .await;

        let (frame, detections) = match outcome {
            Ok((frame, Ok(detections))) => (Some(Arc::new(frame)), detections),
            Ok((frame, Err(e))) => {
                tracing::warn!(
                    error = %e,
                    %timestamp,
                    "inference failed, treating as no detections"
                );
                (Some(Arc::new(frame)), Vec::new())
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    %timestamp,
                    "inference task failed, treating as no detections"
                );
                (None, Vec::new())
            }
        };
        shared.analyzed.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(count = detections.len(), %timestamp, "frame analyzed");

        let set = DetectionSet {
            timestamp,
            image_width,
            image_height,
            rotation_degrees,
            detections,
            frame,
        };
        if results.send(set).await.is_err() {
            tracing::debug!("detection receiver dropped");
            break;
        }
    }

    tracing::debug!(
        submitted = shared.submitted.load(Ordering::Relaxed),
        analyzed = shared.analyzed.load(Ordering::Relaxed),
        dropped = shared.dropped.load(Ordering::Relaxed),
        "frame analyzer stopped"
    );
}

//! Object detection screen pipeline
//!
//! Owns the analyzer, the frame source task and the announcer task for as
//! long as the detection screen is shown.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::{
    BoundingBox, DetectionAnnouncer, DetectionSet, Detector, FrameAnalyzer, FrameSource,
    FrameSubmitter, capture, scaling,
};
use crate::Result;
use crate::speech::SpeechQueue;

/// Read-only view of the latest analyzed frame for UI readers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSnapshot {
    pub latest: Option<DetectionSet>,
    pub frames_analyzed: u64,
}

impl DetectionSnapshot {
    /// Objects in the latest analyzed frame
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.latest.as_ref().map_or(0, |set| set.detections.len())
    }

    /// Labelled boxes of the latest frame mapped onto an upright preview
    #[must_use]
    pub fn preview_boxes(
        &self,
        preview_width: u32,
        preview_height: u32,
    ) -> Vec<(String, BoundingBox)> {
        let Some(set) = &self.latest else {
            return Vec::new();
        };
        set.detections
            .iter()
            .map(|d| {
                let b = scaling::to_preview(
                    &d.bounding_box,
                    set.image_width,
                    set.image_height,
                    set.rotation_degrees,
                    preview_width,
                    preview_height,
                );
                (d.label.clone(), b)
            })
            .collect()
    }
}

/// Running detection pipeline
pub struct DetectionPipeline {
    analyzer: FrameAnalyzer,
    announcer: JoinHandle<()>,
    source: Option<JoinHandle<()>>,
    snapshot: watch::Receiver<DetectionSnapshot>,
}

impl DetectionPipeline {
    /// Start analysis and announcement, and the frame source if one is given
    pub fn start(
        detector: Arc<dyn Detector>,
        source: Option<&dyn FrameSource>,
        threshold: f32,
        speech: SpeechQueue,
    ) -> Self {
        let (results_tx, results_rx) = mpsc::channel(4);
        let analyzer = FrameAnalyzer::spawn(detector, threshold, results_tx);
        let (snapshot_tx, snapshot) = watch::channel(DetectionSnapshot::default());

        let announcer = tokio::spawn(announce(results_rx, speech, snapshot_tx));
        let source = source.map(|s| s.start(analyzer.submitter()));

        tracing::info!(threshold, "detection pipeline started");

        Self {
            analyzer,
            announcer,
            source,
            snapshot,
        }
    }

    /// Handle for pushing frames from an external producer
    #[must_use]
    pub fn submitter(&self) -> FrameSubmitter {
        self.analyzer.submitter()
    }

    #[must_use]
    pub fn snapshot(&self) -> watch::Receiver<DetectionSnapshot> {
        self.snapshot.clone()
    }

    /// Change the confidence threshold for frames analyzed from now on
    pub fn set_threshold(&self, threshold: f32) {
        self.analyzer.set_threshold(threshold);
        tracing::debug!(threshold = self.analyzer.threshold(), "detection threshold changed");
    }

    /// Save the latest analyzed frame with its boxes drawn
    ///
    /// Returns `None` before the first frame has been analyzed.
    ///
    /// # Errors
    ///
    /// Returns error if the frame cannot be decoded or written
    pub fn capture(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let latest = self.snapshot.borrow().latest.clone();
        latest.map(|set| capture::save(&set, dir)).transpose()
    }

    /// Stop producing, analyzing and announcing
    pub async fn teardown(self) {
        if let Some(source) = &self.source {
            source.abort();
        }
        let dropped = self.analyzer.dropped_frames();
        self.analyzer.close().await;
        // The announcer ends once the analyzer's sender is gone
        if let Err(e) = self.announcer.await
            && !e.is_cancelled()
        {
            tracing::warn!(error = %e, "announcer task failed");
        }
        tracing::info!(dropped_frames = dropped, "detection pipeline stopped");
    }
}

async fn announce(
    mut results: mpsc::Receiver<DetectionSet>,
    speech: SpeechQueue,
    snapshot: watch::Sender<DetectionSnapshot>,
) {
    let mut announcer = DetectionAnnouncer::new();

    while let Some(set) = results.recv().await {
        if let Some(utterance) = announcer.observe(&set.detections) {
            tracing::info!(text = %utterance.text, "announcing detections");
            speech.speak(utterance);
        }
        snapshot.send_modify(|s| {
            s.frames_analyzed += 1;
            s.latest = Some(set);
        });
    }
}

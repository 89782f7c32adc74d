//! Spoken announcement of changed detection sets

use super::Detection;
use crate::speech::{Utterance, tags};

/// Speaks detected labels whenever the set of labels changes
///
/// Two sets are the same when their sorted label lists are equal, so
/// reordering or box jitter between frames stays silent.
#[derive(Debug, Default)]
pub struct DetectionAnnouncer {
    last: Option<Vec<String>>,
}

impl DetectionAnnouncer {
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Observe one frame's detections
    ///
    /// Returns the utterance to speak, if any. An empty set is never spoken
    /// but clears the memory, so objects that reappear are announced again.
    pub fn observe(&mut self, detections: &[Detection]) -> Option<Utterance> {
        if detections.is_empty() {
            self.last = None;
            return None;
        }

        let mut key: Vec<String> = detections.iter().map(|d| d.label.clone()).collect();
        key.sort_unstable();
        if self.last.as_ref() == Some(&key) {
            return None;
        }
        self.last = Some(key);

        let labels: Vec<&str> = detections.iter().map(|d| d.label.as_str()).collect();
        Some(Utterance::flush(announcement(&labels)).with_tag(tags::DETECTION))
    }
}

/// `"Detected: a, b"`
#[must_use]
pub fn announcement(labels: &[&str]) -> String {
    format!("Detected: {}", labels.join(", "))
}

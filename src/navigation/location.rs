//! Location update sources

use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::geo::LatLng;
use crate::{Error, Result};

/// Continuous producer of location fixes
pub trait LocationSource: Send + Sync {
    /// Deliver fixes into `updates` in arrival order
    ///
    /// The task ends when the receiver is dropped; aborting it unsubscribes.
    fn subscribe(&self, updates: mpsc::Sender<LatLng>) -> JoinHandle<()>;
}

/// Parse JSON-lines fixes (`{"lat": .., "lng": ..}`)
///
/// Blank lines and lines starting with `#` are skipped.
///
/// # Errors
///
/// Returns error naming the first malformed line
pub fn parse_fixes(text: &str) -> Result<Vec<LatLng>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(n, line)| {
            serde_json::from_str::<LatLng>(line)
                .map_err(|e| Error::Location(format!("line {}: {e}", n + 1)))
        })
        .collect()
}

/// Replays recorded fixes at a fixed interval
#[derive(Debug, Clone)]
pub struct ReplayLocationSource {
    fixes: Vec<LatLng>,
    interval: Duration,
}

impl ReplayLocationSource {
    #[must_use]
    pub const fn new(fixes: Vec<LatLng>, interval: Duration) -> Self {
        Self { fixes, interval }
    }

    /// Load fixes from a JSON-lines file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &Path, interval: Duration) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let fixes = parse_fixes(&text)?;
        tracing::debug!(path = %path.display(), fixes = fixes.len(), "location replay loaded");
        Ok(Self::new(fixes, interval))
    }

    #[must_use]
    pub fn fixes(&self) -> &[LatLng] {
        &self.fixes
    }
}

impl LocationSource for ReplayLocationSource {
    fn subscribe(&self, updates: mpsc::Sender<LatLng>) -> JoinHandle<()> {
        let fixes = self.fixes.clone();
        let interval = self.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            for fix in fixes {
                ticker.tick().await;
                if updates.send(fix).await.is_err() {
                    return;
                }
            }
            tracing::debug!("location replay finished");
        })
    }
}

//! Frame producers

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use image::ImageFormat;
use tokio::task::JoinHandle;

use super::{Frame, FrameSubmitter};
use crate::{Error, Result};

/// Continuous producer of camera frames
pub trait FrameSource: Send + Sync {
    /// Start producing into `frames`; the task ends when the analyzer closes
    fn start(&self, frames: FrameSubmitter) -> JoinHandle<()>;
}

/// Build a [`Frame`] from encoded image bytes
///
/// # Errors
///
/// Returns error if the format is unknown or the header cannot be read
pub fn load_frame(data: Vec<u8>, rotation_degrees: u16) -> Result<Frame> {
    let reader = image::io::Reader::new(Cursor::new(&data)).with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| Error::Frame("unrecognized image format".to_string()))?;
    let (width, height) = reader.into_dimensions()?;

    Ok(Frame {
        mime_type: mime_type(format).to_string(),
        data,
        width,
        height,
        rotation_degrees,
        timestamp: Utc::now(),
    })
}

const fn mime_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        _ => "image/jpeg",
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            matches!(
                e.to_ascii_lowercase().as_str(),
                "jpg" | "jpeg" | "png" | "gif" | "webp"
            )
        })
}

/// Replays the images in a directory as a camera stream
#[derive(Debug, Clone)]
pub struct DirectoryFrameSource {
    frames: Vec<PathBuf>,
    interval: Duration,
    rotation_degrees: u16,
    repeat: bool,
}

impl DirectoryFrameSource {
    /// Collect the images in `dir`, in file name order
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be read or holds no images
    pub fn new(dir: &Path, fps: f32) -> Result<Self> {
        let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_image(p))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(Error::Frame(format!("no images in {}", dir.display())));
        }

        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 1.0 };
        Ok(Self {
            frames,
            interval: Duration::from_secs_f32(1.0 / fps),
            rotation_degrees: 0,
            repeat: false,
        })
    }

    #[must_use]
    pub const fn with_rotation(mut self, rotation_degrees: u16) -> Self {
        self.rotation_degrees = rotation_degrees;
        self
    }

    /// Loop over the directory until the analyzer closes
    #[must_use]
    pub const fn repeating(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for DirectoryFrameSource {
    fn start(&self, submitter: FrameSubmitter) -> JoinHandle<()> {
        let source = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(source.interval);
            loop {
                for path in &source.frames {
                    ticker.tick().await;
                    if submitter.is_closed() {
                        return;
                    }

                    let frame = match tokio::fs::read(path).await {
                        Ok(data) => load_frame(data, source.rotation_degrees),
                        Err(e) => Err(e.into()),
                    };
                    match frame {
                        Ok(frame) => {
                            tracing::trace!(path = %path.display(), "frame captured");
                            submitter.submit(frame);
                        }
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "skipping frame");
                        }
                    }
                }
                if !source.repeat {
                    tracing::debug!(frames = source.frames.len(), "frame directory exhausted");
                    return;
                }
            }
        })
    }
}

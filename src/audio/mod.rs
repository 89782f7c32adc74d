//! Microphone capture, speaker playback and speech segmentation

mod capture;
mod playback;
mod segmenter;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use playback::{AudioPlayback, decode_mp3};
pub use segmenter::{SegmentStatus, SegmenterState, UtteranceSegmenter, calculate_energy};

//! Energy-based speech segmentation
//!
//! Splits a microphone stream into one utterance: speech start is an RMS
//! energy rise, speech end is a run of silence after enough speech.

use super::SAMPLE_RATE;

/// Minimum RMS energy considered speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum speech length to count as an utterance (0.3 s)
const MIN_SPEECH_SAMPLES: usize = (SAMPLE_RATE as usize * 3) / 10;

/// Silence length that ends an utterance (0.5 s)
const SILENCE_SAMPLES: usize = SAMPLE_RATE as usize / 2;

/// Segmenter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// Waiting for speech
    Idle,
    /// Speech detected, accumulating
    Speaking,
}

/// Result of feeding one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    /// Nothing heard yet
    Waiting,
    /// Speech in progress
    InProgress,
    /// Speech followed by silence; take the utterance
    Complete,
}

/// Accumulates one spoken utterance from streamed samples
#[derive(Debug)]
pub struct UtteranceSegmenter {
    state: SegmenterState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl Default for UtteranceSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceSegmenter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SegmenterState::Idle,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Feed a chunk of samples
    pub fn process(&mut self, samples: &[f32]) -> SegmentStatus {
        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            SegmenterState::Idle => {
                if !is_speech {
                    return SegmentStatus::Waiting;
                }
                self.state = SegmenterState::Speaking;
                self.speech_buffer.clear();
                self.speech_buffer.extend_from_slice(samples);
                self.silence_counter = 0;
                tracing::trace!(energy, "speech started");
                SegmentStatus::InProgress
            }
            SegmenterState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > SILENCE_SAMPLES
                    && self.speech_buffer.len() > MIN_SPEECH_SAMPLES + self.silence_counter
                {
                    tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                    return SegmentStatus::Complete;
                }

                // A short noise burst followed by silence: start over
                if self.silence_counter > SILENCE_SAMPLES {
                    tracing::trace!("noise burst discarded");
                    self.reset();
                    return SegmentStatus::Waiting;
                }

                SegmentStatus::InProgress
            }
        }
    }

    /// Take the accumulated utterance and reset
    pub fn take_utterance(&mut self) -> Vec<f32> {
        let samples = std::mem::take(&mut self.speech_buffer);
        self.reset();
        samples
    }

    /// Reset to idle
    pub fn reset(&mut self) {
        self.state = SegmenterState::Idle;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }

    #[must_use]
    pub const fn state(&self) -> SegmenterState {
        self.state
    }
}

/// RMS energy of audio samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_of_silence_and_tone() {
        assert!(calculate_energy(&[0.0; 100]) < 0.001);
        assert!(calculate_energy(&[0.5; 100]) > 0.4);
        assert!(calculate_energy(&[]).abs() < f32::EPSILON);
    }

    #[test]
    fn silence_keeps_waiting() {
        let mut seg = UtteranceSegmenter::new();
        assert_eq!(seg.process(&[0.0; 1600]), SegmentStatus::Waiting);
        assert_eq!(seg.state(), SegmenterState::Idle);
    }

    #[test]
    fn noise_burst_is_discarded() {
        let mut seg = UtteranceSegmenter::new();
        // 0.1 s of noise is shorter than the minimum utterance
        assert_eq!(seg.process(&[0.3; 1600]), SegmentStatus::InProgress);
        assert_eq!(seg.process(&[0.0; 9000]), SegmentStatus::Waiting);
        assert_eq!(seg.state(), SegmenterState::Idle);
    }
}

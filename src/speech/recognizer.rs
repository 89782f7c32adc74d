//! Microphone listening backed by cloud STT

use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{RecognitionEvent, SpeechRecognizer, SpeechToText};
use crate::audio::{AudioCapture, SAMPLE_RATE, SegmentStatus, UtteranceSegmenter, samples_to_wav};
use crate::{Error, Result};

/// Microphone poll interval
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How one capture attempt ended
enum Capture {
    Utterance(Vec<f32>),
    Silence,
}

/// Listens on the default microphone and transcribes each utterance
pub struct CloudRecognizer {
    stt: SpeechToText,
    timeout: Duration,
}

impl CloudRecognizer {
    /// `timeout` bounds how long one cycle waits for speech to start and end
    #[must_use]
    pub const fn new(stt: SpeechToText, timeout: Duration) -> Self {
        Self { stt, timeout }
    }
}

/// Capture until one utterance is segmented or `timeout` passes
fn capture_utterance(timeout: Duration) -> Result<Capture> {
    let mut capture = AudioCapture::new()?;
    let mut segmenter = UtteranceSegmenter::new();
    capture.start()?;

    let deadline = Instant::now() + timeout;
    let outcome = loop {
        std::thread::sleep(POLL_INTERVAL);
        let chunk = capture.take_buffer();

        if !chunk.is_empty() && segmenter.process(&chunk) == SegmentStatus::Complete {
            break Capture::Utterance(segmenter.take_utterance());
        }
        if Instant::now() >= deadline {
            break Capture::Silence;
        }
    };

    capture.stop();
    Ok(outcome)
}

#[async_trait]
impl SpeechRecognizer for CloudRecognizer {
    async fn listen(&mut self) -> RecognitionEvent {
        let timeout = self.timeout;
        let captured = tokio::task::spawn_blocking(move || capture_utterance(timeout))
            .await
            .map_err(|e| Error::Audio(format!("capture task failed: {e}")))
            .and_then(|r| r);

        let samples = match captured {
            Ok(Capture::Utterance(samples)) => samples,
            Ok(Capture::Silence) => return RecognitionEvent::NoMatch,
            Err(e) => return RecognitionEvent::Error(e.to_string()),
        };

        let wav = match samples_to_wav(&samples, SAMPLE_RATE) {
            Ok(wav) => wav,
            Err(e) => return RecognitionEvent::Error(e.to_string()),
        };

        match self.stt.transcribe(&wav).await {
            Ok(text) if text.trim().is_empty() => RecognitionEvent::NoMatch,
            Ok(text) => RecognitionEvent::Result(text),
            Err(e) => RecognitionEvent::Error(e.to_string()),
        }
    }
}

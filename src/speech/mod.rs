//! Speech recognition and synthesis boundaries
//!
//! Recognizers and synthesizers are platform collaborators behind traits.
//! Spoken output is funneled through [`SpeechQueue`], the single consumer
//! that owns the synthesizer.

mod console;
mod queue;
mod recognizer;
mod stt;
mod synthesizer;
mod tts;

use async_trait::async_trait;

pub use console::{ConsoleSynthesizer, StdinRecognizer};
pub use queue::SpeechQueue;
pub use recognizer::CloudRecognizer;
pub use stt::SpeechToText;
pub use synthesizer::CloudSynthesizer;
pub use tts::TextToSpeech;

use crate::Result;

/// Utterance tags, for logs and for filtering in tests
pub mod tags {
    pub const WELCOME: &str = "WELCOME";
    pub const RETRY_PROMPT: &str = "RETRY_PROMPT";
    pub const DETECTION: &str = "DETECTION";
    pub const DESTINATION_PROMPT: &str = "DESTINATION_PROMPT";
    pub const SEARCHING_LOCATION: &str = "SEARCHING_LOCATION";
    pub const LOCATION_FOUND: &str = "LOCATION_FOUND";
    pub const LOCATION_NOT_FOUND: &str = "LOCATION_NOT_FOUND";
    pub const ROUTE_READY: &str = "ROUTE_READY";
    pub const DIRECTIONS_ERROR: &str = "DIRECTIONS_ERROR";
    pub const DIRECTION_STEP: &str = "DIRECTION_STEP";
    pub const ARRIVAL: &str = "ARRIVAL";
    pub const PERMISSION: &str = "PERMISSION";
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
}

/// How a new utterance interacts with speech already queued or playing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Interrupt current speech and drop anything pending
    Flush,
    /// Speak after everything already queued
    Add,
}

/// One spoken output request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub mode: QueueMode,
    pub tag: Option<&'static str>,
}

impl Utterance {
    /// Utterance that replaces whatever is being spoken
    #[must_use]
    pub fn flush(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: QueueMode::Flush,
            tag: None,
        }
    }

    /// Utterance queued behind pending speech
    #[must_use]
    pub fn add(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: QueueMode::Add,
            tag: None,
        }
    }

    #[must_use]
    pub const fn with_tag(mut self, tag: &'static str) -> Self {
        self.tag = Some(tag);
        self
    }
}

/// Produces audio for text
///
/// `speak` resolves when the utterance has been fully spoken. Dropping the
/// future must stop playback; that is how flush interrupts speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` to completion
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Outcome of one listening cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Best transcription of what was said
    Result(String),
    /// Nothing intelligible was heard
    NoMatch,
    /// The recognizer failed
    Error(String),
    /// Speech ended without a result
    EndOfSpeech,
}

/// Listens for one utterance per call
#[async_trait]
pub trait SpeechRecognizer: Send {
    /// Run one listening cycle and report how it ended
    async fn listen(&mut self) -> RecognitionEvent;
}

#[async_trait]
impl<T: SpeechRecognizer + ?Sized> SpeechRecognizer for Box<T> {
    async fn listen(&mut self) -> RecognitionEvent {
        (**self).listen().await
    }
}

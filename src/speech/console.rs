//! Headless speech backends for `--disable-voice`
//!
//! Spoken output goes to stdout and utterances are read from stdin, one per
//! line.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use super::{RecognitionEvent, SpeechRecognizer, SpeechSynthesizer};
use crate::Result;

/// Prints each utterance instead of speaking it
#[derive(Debug, Default)]
pub struct ConsoleSynthesizer;

#[async_trait]
impl SpeechSynthesizer for ConsoleSynthesizer {
    async fn speak(&self, text: &str) -> Result<()> {
        println!("[sense8] {text}");
        Ok(())
    }
}

/// Treats each stdin line as one recognized utterance
pub struct StdinRecognizer {
    lines: Lines<BufReader<Stdin>>,
}

impl Default for StdinRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl StdinRecognizer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for StdinRecognizer {
    async fn listen(&mut self) -> RecognitionEvent {
        match self.lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => RecognitionEvent::NoMatch,
            Ok(Some(line)) => RecognitionEvent::Result(line.trim().to_string()),
            // Stdin closed; no further utterances
            Ok(None) => std::future::pending().await,
            Err(e) => RecognitionEvent::Error(e.to_string()),
        }
    }
}

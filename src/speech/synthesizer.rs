//! Speaker output backed by cloud TTS

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{SpeechSynthesizer, TextToSpeech};
use crate::audio::{AudioPlayback, decode_mp3};
use crate::{Error, Result};

/// Synthesizes with [`TextToSpeech`] and plays on the default speaker
pub struct CloudSynthesizer {
    tts: TextToSpeech,
    playback: AudioPlayback,
}

impl CloudSynthesizer {
    #[must_use]
    pub const fn new(tts: TextToSpeech, playback: AudioPlayback) -> Self {
        Self { tts, playback }
    }
}

/// Sets the stop flag when the speaking future is dropped
struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl SpeechSynthesizer for CloudSynthesizer {
    async fn speak(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }

        let mp3 = self.tts.synthesize(text).await?;
        let samples = decode_mp3(&mp3)?;

        let stop = Arc::new(AtomicBool::new(false));
        let _guard = StopOnDrop(Arc::clone(&stop));
        let playback = self.playback.clone();

        let completed = tokio::task::spawn_blocking(move || playback.play_blocking(samples, &stop))
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))??;

        if !completed {
            tracing::debug!("playback stopped early");
        }
        Ok(())
    }
}

//! Single-consumer speech output queue
//!
//! Producers on any task post [`Utterance`]s; one consumer task owns the
//! synthesizer and applies them in order. A `Flush` utterance drops pending
//! speech and interrupts the utterance being spoken.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{QueueMode, SpeechSynthesizer, Utterance};

/// Cloneable handle for posting utterances
#[derive(Debug, Clone)]
pub struct SpeechQueue {
    tx: mpsc::UnboundedSender<Utterance>,
}

impl SpeechQueue {
    /// Spawn the consumer task that owns `synthesizer`
    ///
    /// The task ends once every handle has been dropped and the remaining
    /// queue has been spoken.
    #[must_use]
    pub fn spawn(synthesizer: Arc<dyn SpeechSynthesizer>) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::channel();
        let handle = tokio::spawn(run_queue(synthesizer, rx));
        (queue, handle)
    }

    /// Handle whose utterances arrive on the returned receiver, unspoken
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Utterance>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Post an utterance
    pub fn speak(&self, utterance: Utterance) {
        if self.tx.send(utterance).is_err() {
            tracing::debug!("speech queue closed, utterance dropped");
        }
    }

    /// Replace current speech with `text`
    pub fn flush(&self, text: impl Into<String>, tag: &'static str) {
        self.speak(Utterance::flush(text).with_tag(tag));
    }

    /// Queue `text` behind current speech
    pub fn enqueue(&self, text: impl Into<String>, tag: &'static str) {
        self.speak(Utterance::add(text).with_tag(tag));
    }
}

async fn run_queue(
    synthesizer: Arc<dyn SpeechSynthesizer>,
    mut rx: mpsc::UnboundedReceiver<Utterance>,
) {
    let mut pending: VecDeque<Utterance> = VecDeque::new();
    let mut closed = false;

    loop {
        let current = match pending.pop_front() {
            Some(u) => u,
            None if closed => break,
            None => match rx.recv().await {
                Some(u) => u,
                None => break,
            },
        };

        tracing::debug!(tag = current.tag, text = %current.text, "speaking");

        let speaking = synthesizer.speak(&current.text);
        tokio::pin!(speaking);

        loop {
            tokio::select! {
                biased;

                result = &mut speaking => {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, tag = current.tag, "speech synthesis failed");
                    }
                    break;
                }
                next = rx.recv(), if !closed => match next {
                    Some(next) if next.mode == QueueMode::Flush => {
                        tracing::debug!(
                            interrupted = current.tag,
                            dropped = pending.len(),
                            "speech flushed"
                        );
                        pending.clear();
                        pending.push_back(next);
                        break;
                    }
                    Some(next) => pending.push_back(next),
                    None => closed = true,
                },
            }
        }
    }

    tracing::debug!("speech queue stopped");
}

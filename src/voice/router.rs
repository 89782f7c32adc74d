//! Persistent voice command listener
//!
//! [`ListenerMachine`] holds the re-arm rules: every terminal recognition
//! event leads back to `Listening` until the owner stops it.
//! [`VoiceCommandRouter`] drives a recognizer with that machine and publishes
//! what it heard.

use std::time::Duration;

use tokio::sync::{mpsc, watch};

use super::{BackoffPolicy, VoiceCommand};
use crate::speech::{RecognitionEvent, SpeechQueue, SpeechRecognizer, tags};

/// Spoken after an unrecognized command or an empty listening cycle
pub const REPROMPT: &str = "I didn't catch that. Please say 'navigation' or 'object detection'.";

/// Listener lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Not yet started
    Idle,
    /// A listening cycle is armed
    Listening,
    /// Torn down; no further cycles
    Stopped,
}

/// How recognized text is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenMode {
    /// Only the command vocabulary is meaningful
    #[default]
    Commands,
    /// Non-command utterances are passed through (destination names)
    FreeForm,
}

/// What the router does after one listening cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenOutcome {
    /// Publish a recognized command
    Command(VoiceCommand),
    /// Publish free-form text
    Utterance(String),
    /// Reprompt, then report the unrecognized text
    Unrecognized(String),
    /// Nothing heard: reprompt
    Reprompt,
    /// Re-arm immediately
    Relisten,
    /// Recognizer failed: re-arm after a delay
    Backoff(Duration),
}

/// Re-arm state machine for the listener
#[derive(Debug)]
pub struct ListenerMachine {
    state: ListenerState,
    cycles: u64,
    consecutive_errors: u32,
    backoff: BackoffPolicy,
}

impl ListenerMachine {
    #[must_use]
    pub const fn new(backoff: BackoffPolicy) -> Self {
        Self {
            state: ListenerState::Idle,
            cycles: 0,
            consecutive_errors: 0,
            backoff,
        }
    }

    /// Arm the first listening cycle
    ///
    /// Returns `false` if the machine was already stopped.
    pub fn start(&mut self) -> bool {
        match self.state {
            ListenerState::Stopped => false,
            ListenerState::Idle | ListenerState::Listening => {
                self.state = ListenerState::Listening;
                true
            }
        }
    }

    /// Apply the terminal event of one listening cycle
    ///
    /// Returns `None` unless the machine is listening. Otherwise the state is
    /// `Listening` again on return.
    pub fn on_event(&mut self, event: RecognitionEvent, mode: ListenMode) -> Option<ListenOutcome> {
        if self.state != ListenerState::Listening {
            return None;
        }
        self.cycles += 1;

        let outcome = match event {
            RecognitionEvent::Result(text) => {
                self.consecutive_errors = 0;
                match (VoiceCommand::parse(&text), mode) {
                    (VoiceCommand::Unrecognized(text), ListenMode::Commands) => {
                        ListenOutcome::Unrecognized(text)
                    }
                    (VoiceCommand::Unrecognized(text), ListenMode::FreeForm) => {
                        ListenOutcome::Utterance(text)
                    }
                    (command, _) => ListenOutcome::Command(command),
                }
            }
            RecognitionEvent::NoMatch => {
                self.consecutive_errors = 0;
                match mode {
                    ListenMode::Commands => ListenOutcome::Reprompt,
                    ListenMode::FreeForm => ListenOutcome::Relisten,
                }
            }
            RecognitionEvent::EndOfSpeech => {
                self.consecutive_errors = 0;
                ListenOutcome::Relisten
            }
            RecognitionEvent::Error(message) => {
                let delay = self.backoff.delay_for_attempt(self.consecutive_errors);
                self.consecutive_errors = self.consecutive_errors.saturating_add(1);
                tracing::warn!(
                    error = %message,
                    consecutive = self.consecutive_errors,
                    delay_ms = delay.as_millis(),
                    "speech recognition failed"
                );
                ListenOutcome::Backoff(delay)
            }
        };

        Some(outcome)
    }

    /// Tear down; terminal
    pub fn stop(&mut self) {
        self.state = ListenerState::Stopped;
    }

    #[must_use]
    pub const fn state(&self) -> ListenerState {
        self.state
    }

    /// Completed listening cycles
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }
}

/// Published by the router to the screen owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    Command(VoiceCommand),
    /// Free-form text heard in [`ListenMode::FreeForm`]
    Utterance(String),
    /// Text that matched no command
    Unrecognized(String),
}

/// Router timing
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Pause after a reprompt before listening again
    pub reprompt_delay: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            reprompt_delay: Duration::from_secs(4),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Runs a recognizer in a persistent listening loop
pub struct VoiceCommandRouter<R> {
    recognizer: R,
    speech: SpeechQueue,
    settings: RouterSettings,
    mode: watch::Receiver<ListenMode>,
    events: mpsc::Sender<RouterEvent>,
}

impl<R: SpeechRecognizer> VoiceCommandRouter<R> {
    #[must_use]
    pub const fn new(
        recognizer: R,
        speech: SpeechQueue,
        settings: RouterSettings,
        mode: watch::Receiver<ListenMode>,
        events: mpsc::Sender<RouterEvent>,
    ) -> Self {
        Self {
            recognizer,
            speech,
            settings,
            mode,
            events,
        }
    }

    /// Listen until `shutdown` turns true or the event receiver is dropped
    ///
    /// Returns the stopped state machine.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ListenerMachine {
        let mut machine = ListenerMachine::new(self.settings.backoff.clone());
        machine.start();
        tracing::info!("voice command router started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let event = tokio::select! {
                _ = shutdown.changed() => break,
                event = self.recognizer.listen() => event,
            };
            tracing::debug!(?event, "recognition cycle finished");

            let mode = *self.mode.borrow();
            let Some(outcome) = machine.on_event(event, mode) else {
                break;
            };

            let (publish, pause) = match outcome {
                ListenOutcome::Command(command) => {
                    tracing::info!(%command, "voice command recognized");
                    (Some(RouterEvent::Command(command)), None)
                }
                ListenOutcome::Utterance(text) => (Some(RouterEvent::Utterance(text)), None),
                ListenOutcome::Unrecognized(text) => {
                    tracing::info!(utterance = %text, "unrecognized voice command");
                    self.speech.flush(REPROMPT, tags::RETRY_PROMPT);
                    (
                        Some(RouterEvent::Unrecognized(text)),
                        Some(self.settings.reprompt_delay),
                    )
                }
                ListenOutcome::Reprompt => {
                    self.speech.flush(REPROMPT, tags::RETRY_PROMPT);
                    (None, Some(self.settings.reprompt_delay))
                }
                ListenOutcome::Relisten => (None, None),
                ListenOutcome::Backoff(delay) => (None, Some(delay)),
            };

            if let Some(event) = publish
                && self.events.send(event).await.is_err()
            {
                tracing::debug!("router event receiver dropped");
                break;
            }

            if let Some(pause) = pause {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    () = tokio::time::sleep(pause) => {}
                }
            }
        }

        machine.stop();
        tracing::info!(cycles = machine.cycles(), "voice command router stopped");
        machine
    }
}

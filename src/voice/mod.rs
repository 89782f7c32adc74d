//! Voice command recognition
//!
//! The router keeps a recognizer listening for the whole app lifetime and
//! publishes recognized commands for screen routing.

mod backoff;
mod command;
mod router;

pub use backoff::BackoffPolicy;
pub use command::VoiceCommand;
pub use router::{
    ListenMode, ListenOutcome, ListenerMachine, ListenerState, REPROMPT, RouterEvent,
    RouterSettings, VoiceCommandRouter,
};

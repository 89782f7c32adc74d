//! Top-level screen routing

use crate::permissions::Permission;
use crate::voice::VoiceCommand;

/// Screen the app is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    /// Welcome prompt, waiting for a command
    #[default]
    Waiting,
    ObjectDetection,
    Navigation,
}

impl Screen {
    /// Permission the screen's pipeline needs
    #[must_use]
    pub const fn required_permission(self) -> Option<Permission> {
        match self {
            Self::Waiting => None,
            Self::ObjectDetection => Some(Permission::Camera),
            Self::Navigation => Some(Permission::Location),
        }
    }
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::ObjectDetection => write!(f, "object-detection"),
            Self::Navigation => write!(f, "navigation"),
        }
    }
}

/// Tracks the screen voice commands have switched to
#[derive(Debug, Default)]
pub struct ScreenRouter {
    current: Screen,
}

impl ScreenRouter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: Screen::Waiting,
        }
    }

    #[must_use]
    pub const fn current(&self) -> Screen {
        self.current
    }

    /// Screen a command asks for
    ///
    /// Unrecognized commands never name a screen.
    #[must_use]
    pub const fn target(command: &VoiceCommand) -> Option<Screen> {
        match command {
            VoiceCommand::Navigation => Some(Screen::Navigation),
            VoiceCommand::ObjectDetection => Some(Screen::ObjectDetection),
            VoiceCommand::Unrecognized(_) => None,
        }
    }

    /// Switch to `screen`; returns `false` if it is already shown
    pub fn enter(&mut self, screen: Screen) -> bool {
        if screen == self.current {
            return false;
        }
        tracing::info!(from = %self.current, to = %screen, "screen change");
        self.current = screen;
        true
    }
}

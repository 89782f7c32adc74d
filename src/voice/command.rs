//! Closed command vocabulary

/// A recognized top-level command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceCommand {
    Navigation,
    ObjectDetection,
    /// Anything else, carrying the trimmed utterance
    Unrecognized(String),
}

impl VoiceCommand {
    /// Match an utterance against the command vocabulary
    ///
    /// Matching is case-insensitive on the whole trimmed utterance.
    #[must_use]
    pub fn parse(utterance: &str) -> Self {
        let trimmed = utterance.trim();
        if trimmed.eq_ignore_ascii_case("navigation") {
            Self::Navigation
        } else if trimmed.eq_ignore_ascii_case("object detection") {
            Self::ObjectDetection
        } else {
            Self::Unrecognized(trimmed.to_string())
        }
    }

    #[must_use]
    pub const fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl std::fmt::Display for VoiceCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Navigation => write!(f, "navigation"),
            Self::ObjectDetection => write!(f, "object detection"),
            Self::Unrecognized(text) => write!(f, "unrecognized({text})"),
        }
    }
}

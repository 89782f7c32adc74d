//! Error types for Sense8

use thiserror::Error;

/// Result type alias for Sense8 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Sense8
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Object detection inference error
    #[error("inference error: {0}")]
    Inference(String),

    /// Malformed encoded polyline
    #[error("polyline error: {0}")]
    Polyline(String),

    /// Directions lookup error (transport or response shape)
    #[error("directions error: {0}")]
    Directions(String),

    /// Geocoding lookup error
    #[error("geocoding error: {0}")]
    Geocoding(String),

    /// Camera or location permission not granted
    #[error("permission denied: {0}")]
    Permission(String),

    /// Frame source error
    #[error("frame error: {0}")]
    Frame(String),

    /// Frame capture error
    #[error("capture error: {0}")]
    Capture(String),

    /// Location source error
    #[error("location error: {0}")]
    Location(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Image decoding error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

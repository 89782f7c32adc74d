//! TOML configuration file loading
//!
//! Supports `~/.config/sense8/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct Sense8ConfigFile {
    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Remote endpoint overrides
    #[serde(default)]
    pub endpoints: EndpointsFileConfig,

    /// Object detection configuration
    #[serde(default)]
    pub detection: DetectionFileConfig,

    /// Turn-by-turn navigation configuration
    #[serde(default)]
    pub navigation: NavigationFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Data directory override
    pub data_dir: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub google_maps: Option<String>,
    pub openai: Option<String>,
    pub anthropic: Option<String>,
}

/// Endpoint base URLs
#[derive(Debug, Default, Deserialize)]
pub struct EndpointsFileConfig {
    /// Maps API base (directions and geocoding)
    pub maps: Option<String>,
    /// OpenAI-compatible speech API base
    pub openai: Option<String>,
    /// Anthropic API base (vision detector)
    pub anthropic: Option<String>,
}

/// Object detection configuration
#[derive(Debug, Default, Deserialize)]
pub struct DetectionFileConfig {
    /// Initial confidence threshold (0.0 to 1.0)
    pub confidence_threshold: Option<f32>,
    /// Vision model identifier
    pub vision_model: Option<String>,
}

/// Navigation configuration
#[derive(Debug, Default, Deserialize)]
pub struct NavigationFileConfig {
    /// Distance in meters under which a step endpoint counts as reached
    pub arrival_radius_m: Option<f64>,
    /// Interval between replayed GPS fixes in milliseconds
    pub location_interval_ms: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// Delay before listening again after an unrecognized command
    pub reprompt_delay_ms: Option<u64>,

    /// Maximum wait for speech in one listening cycle
    pub listen_timeout_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `Sense8ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> Sense8ConfigFile {
    let Some(path) = config_file_path() else {
        return Sense8ConfigFile::default();
    };

    if !path.exists() {
        return Sense8ConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                Sense8ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            Sense8ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/sense8/config.toml`
///
/// `SENSE8_CONFIG` overrides the location.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SENSE8_CONFIG") {
        return Some(PathBuf::from(path));
    }

    directories::BaseDirs::new().map(|d| d.config_dir().join("sense8").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let file: Sense8ConfigFile = toml::from_str(
            r#"
            [navigation]
            arrival_radius_m = 15.0

            [voice]
            tts_voice = "nova"
            "#,
        )
        .unwrap();

        assert_eq!(file.navigation.arrival_radius_m, Some(15.0));
        assert_eq!(file.voice.tts_voice.as_deref(), Some("nova"));
        assert!(file.api_keys.google_maps.is_none());
        assert!(file.detection.confidence_threshold.is_none());
    }
}

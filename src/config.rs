//! Configuration management for Sense8

pub mod file;

use std::path::PathBuf;

use crate::permissions::PermissionState;
use crate::{Error, Result};

/// Default maps API base URL (directions and geocoding)
pub const DEFAULT_MAPS_BASE_URL: &str = "https://maps.googleapis.com";

/// Default OpenAI-compatible speech API base URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Default Anthropic API base URL
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Initial detection confidence threshold
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Distance under which a route step endpoint counts as reached
pub const DEFAULT_ARRIVAL_RADIUS_M: f64 = 20.0;

/// Sense8 configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (preferences database)
    pub data_dir: PathBuf,

    /// API keys
    pub api_keys: ApiKeys,

    /// Remote endpoint base URLs
    pub endpoints: Endpoints,

    /// Object detection configuration
    pub detection: DetectionConfig,

    /// Navigation configuration
    pub navigation: NavigationConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Platform permission states
    pub permissions: PermissionsConfig,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// Google Maps key (directions and geocoding)
    pub google_maps: Option<String>,

    /// `OpenAI` API key (Whisper STT and TTS)
    pub openai: Option<String>,

    /// `Anthropic` API key (vision detector)
    pub anthropic: Option<String>,
}

/// Remote endpoint base URLs
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub maps: String,
    pub openai: String,
    pub anthropic: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            maps: DEFAULT_MAPS_BASE_URL.to_string(),
            openai: DEFAULT_OPENAI_BASE_URL.to_string(),
            anthropic: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
        }
    }
}

/// Object detection configuration
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Initial confidence threshold (0.0 to 1.0), adjustable at runtime
    pub confidence_threshold: f32,

    /// Vision model used by the cloud detector
    pub vision_model: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            vision_model: "claude-sonnet-4-20250514".to_string(),
        }
    }
}

/// Navigation configuration
#[derive(Debug, Clone)]
pub struct NavigationConfig {
    /// Proximity trigger radius in meters
    pub arrival_radius_m: f64,

    /// Interval between location updates when replaying fixes
    pub location_interval_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            arrival_radius_m: DEFAULT_ARRIVAL_RADIUS_M,
            location_interval_ms: 2000,
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input/output
    pub enabled: bool,

    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,

    /// Delay before re-arming the listener after an unrecognized command
    pub reprompt_delay_ms: u64,

    /// Maximum wait for speech in one listening cycle
    pub listen_timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
            reprompt_delay_ms: 4000,
            listen_timeout_secs: 8,
        }
    }
}

/// Platform permission states
///
/// On desktop there is no permission dialog, so both default to granted;
/// embedders report the real state through env vars or by constructing
/// this directly.
#[derive(Debug, Clone, Copy)]
pub struct PermissionsConfig {
    pub camera: PermissionState,
    pub location: PermissionState,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            camera: PermissionState::Granted,
            location: PermissionState::Granted,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api_keys: ApiKeys::default(),
            endpoints: Endpoints::default(),
            detection: DetectionConfig::default(),
            navigation: NavigationConfig::default(),
            voice: VoiceConfig::default(),
            permissions: PermissionsConfig::default(),
        }
    }
}

/// Default data directory: `~/.local/share/sense8` on Linux
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from(".sense8"), |d| d.data_dir().join("sense8"))
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is out of range
    pub fn load() -> Result<Self> {
        Self::load_with_options(false)
    }

    /// Load configuration with explicit voice disable option
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is out of range
    pub fn load_with_options(disable_voice: bool) -> Result<Self> {
        let fc = file::load_config_file();
        let defaults = Self::default();

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            google_maps: std::env::var("GOOGLE_MAPS_API_KEY")
                .ok()
                .or(fc.api_keys.google_maps),
            openai: std::env::var("OPENAI_API_KEY").ok().or(fc.api_keys.openai),
            anthropic: std::env::var("ANTHROPIC_API_KEY")
                .ok()
                .or(fc.api_keys.anthropic),
        };

        let endpoints = Endpoints {
            maps: std::env::var("SENSE8_MAPS_BASE_URL")
                .ok()
                .or(fc.endpoints.maps)
                .unwrap_or(defaults.endpoints.maps),
            openai: std::env::var("SENSE8_OPENAI_BASE_URL")
                .ok()
                .or(fc.endpoints.openai)
                .unwrap_or(defaults.endpoints.openai),
            anthropic: std::env::var("SENSE8_ANTHROPIC_BASE_URL")
                .ok()
                .or(fc.endpoints.anthropic)
                .unwrap_or(defaults.endpoints.anthropic),
        };

        let detection = DetectionConfig {
            confidence_threshold: env_parse("SENSE8_CONFIDENCE_THRESHOLD")
                .or(fc.detection.confidence_threshold)
                .unwrap_or(defaults.detection.confidence_threshold),
            vision_model: std::env::var("SENSE8_VISION_MODEL")
                .ok()
                .or(fc.detection.vision_model)
                .unwrap_or(defaults.detection.vision_model),
        };

        let navigation = NavigationConfig {
            arrival_radius_m: env_parse("SENSE8_ARRIVAL_RADIUS_M")
                .or(fc.navigation.arrival_radius_m)
                .unwrap_or(defaults.navigation.arrival_radius_m),
            location_interval_ms: env_parse("SENSE8_LOCATION_INTERVAL_MS")
                .or(fc.navigation.location_interval_ms)
                .unwrap_or(defaults.navigation.location_interval_ms),
        };

        let voice = VoiceConfig {
            enabled: !disable_voice && fc.voice.enabled.unwrap_or(true),
            stt_model: std::env::var("SENSE8_STT_MODEL")
                .ok()
                .or(fc.voice.stt_model)
                .unwrap_or(defaults.voice.stt_model),
            tts_model: std::env::var("SENSE8_TTS_MODEL")
                .ok()
                .or(fc.voice.tts_model)
                .unwrap_or(defaults.voice.tts_model),
            tts_voice: std::env::var("SENSE8_TTS_VOICE")
                .ok()
                .or(fc.voice.tts_voice)
                .unwrap_or(defaults.voice.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(defaults.voice.tts_speed),
            reprompt_delay_ms: fc
                .voice
                .reprompt_delay_ms
                .unwrap_or(defaults.voice.reprompt_delay_ms),
            listen_timeout_secs: fc
                .voice
                .listen_timeout_secs
                .unwrap_or(defaults.voice.listen_timeout_secs),
        };

        if disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
        }

        let permissions = PermissionsConfig {
            camera: env_parse("SENSE8_CAMERA_PERMISSION").unwrap_or(defaults.permissions.camera),
            location: env_parse("SENSE8_LOCATION_PERMISSION")
                .unwrap_or(defaults.permissions.location),
        };

        // Determine data directory (~/.local/share/sense8 on Linux)
        let data_dir = std::env::var("SENSE8_DATA_DIR")
            .ok()
            .or(fc.data_dir)
            .map_or(defaults.data_dir, PathBuf::from);

        // Ensure data dir exists
        std::fs::create_dir_all(&data_dir).ok();

        let config = Self {
            data_dir,
            api_keys,
            endpoints,
            detection,
            navigation,
            voice,
            permissions,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            return Err(Error::Config(format!(
                "confidence threshold must be within 0.0..=1.0, got {}",
                self.detection.confidence_threshold
            )));
        }

        if !self.navigation.arrival_radius_m.is_finite() || self.navigation.arrival_radius_m <= 0.0
        {
            return Err(Error::Config(format!(
                "arrival radius must be a positive distance, got {}",
                self.navigation.arrival_radius_m
            )));
        }

        if !(0.25..=4.0).contains(&self.voice.tts_speed) {
            return Err(Error::Config(format!(
                "TTS speed must be within 0.25..=4.0, got {}",
                self.voice.tts_speed
            )));
        }

        Ok(())
    }

    /// Path to the preferences database
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("sense8.db")
    }

    /// Google Maps key, required for navigation
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no key is configured
    pub fn require_maps_key(&self) -> Result<&str> {
        self.api_keys
            .google_maps
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("GOOGLE_MAPS_API_KEY is not set".to_string()))
    }
}

/// Parse an env var, ignoring unset or unparseable values
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparseable env var");
            None
        }
    }
}

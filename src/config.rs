//! Configuration for the capture pipeline
//!
//! Provides versioned settings storage with schema migrations. Settings are
//! persisted as JSON under `~/.seshat/config.json`. There is no process-wide
//! settings cache: hosts load a `Config` explicitly and pass it to the
//! session. A reloaded config handed to a running session takes effect on
//! the next return to listening, never mid-utterance.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current config schema version
const CURRENT_VERSION: u32 = 1;

/// Recognised transcription model sizes, in ascending capability order.
///
/// Informational: forwarded to the endpoint and shown in host settings UIs.
pub const MODEL_SIZES: &[&str] = &["tiny", "base", "small", "medium", "large", "turbo"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version for migrations
    pub version: u32,
    /// Frame/chunk capture settings
    pub capture: CaptureConfig,
    /// Voice-activity detection settings
    pub detection: DetectionConfig,
    /// Transcription endpoint settings
    pub transcription: TranscriptionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            capture: CaptureConfig::default(),
            detection: DetectionConfig::default(),
            transcription: TranscriptionConfig::default(),
        }
    }
}

/// Frame/chunk capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Sample rate of the host's analysis frames in Hz
    pub sample_rate: u32,
    /// Cadence at which the host is expected to push analysis frames (ms)
    pub tick_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            tick_interval_ms: 50,
        }
    }
}

/// Voice-activity detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Silence detection threshold (pre-transform RMS, 0.0-1.0).
    /// Lower values are more sensitive to noise.
    pub silence_threshold: f32,
    /// Silence duration before speaking is considered paused (ms)
    pub silence_duration_ms: u64,
    /// Further silence before a paused utterance is finalised (ms)
    pub waiting_timeout_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 0.05,
            silence_duration_ms: 1000,
            waiting_timeout_ms: 2000,
        }
    }
}

impl DetectionConfig {
    /// Silence window as a `Duration`
    pub fn silence_duration(&self) -> Duration {
        Duration::from_millis(self.silence_duration_ms)
    }

    /// Waiting window as a `Duration`
    pub fn waiting_timeout(&self) -> Duration {
        Duration::from_millis(self.waiting_timeout_ms)
    }
}

/// How utterance chunks are packaged into the request payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PayloadEncoding {
    /// Concatenate chunk bytes as-is (recorder emits a container stream)
    #[default]
    Raw,
    /// Treat chunk bytes as mono little-endian i16 PCM and wrap in a WAV container
    Wav,
}

/// Transcription endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Endpoint receiving the encoded utterance payload
    pub endpoint_url: String,
    /// Transcription model size (informational, see [`MODEL_SIZES`])
    pub model_size: String,
    /// Transcription language code (e.g. "en", "fr", "it")
    pub language: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Payload packaging mode
    pub payload: PayloadEncoding,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://localhost:8000/transcribe".to_string(),
            model_size: "base".to_string(),
            language: "en".to_string(),
            timeout_secs: 30,
            payload: PayloadEncoding::Raw,
        }
    }
}

/// Get the default path to the config file (~/.seshat/config.json)
pub fn default_config_path() -> PathBuf {
    home_dir_or_fallback().join(".seshat").join("config.json")
}

/// Get the home directory, falling back to /tmp if unavailable
fn home_dir_or_fallback() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        tracing::error!("Could not determine home directory, using /tmp");
        PathBuf::from("/tmp")
    })
}

impl Config {
    /// Load configuration from the given path, using defaults if absent
    pub fn load(path: &Path) -> Result<Config, String> {
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        let contents =
            fs::read_to_string(path).map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse config: {}", e))?;

        migrate_config(config)
    }

    /// Save configuration to the given path, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)
                    .map_err(|e| format!("Failed to create config directory: {}", e))?;
            }
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialise config: {}", e))?;

        fs::write(path, contents).map_err(|e| format!("Failed to write config file: {}", e))?;

        tracing::info!("Config saved to {}", path.display());
        Ok(())
    }
}

/// Migrate configuration from older schema versions
fn migrate_config(mut config: Config) -> Result<Config, String> {
    let original_version = config.version;

    while config.version < CURRENT_VERSION {
        config = apply_migration(config)?;
    }

    if config.version != original_version {
        tracing::info!(
            "Migrated config from version {} to {}",
            original_version,
            config.version
        );
    }

    Ok(config)
}

/// Apply a single migration step
fn apply_migration(config: Config) -> Result<Config, String> {
    match config.version {
        // Version 0 -> 1: initial schema
        0 => {
            let mut migrated = config;
            migrated.version = 1;
            Ok(migrated)
        }
        v => Err(format!("Unknown config version: {}", v)),
    }
}

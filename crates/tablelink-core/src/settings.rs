//! Configuration file support for tablelink
//!
//! Settings are stored in TOML format at:
//! - Linux: `~/.config/tablelink/config.toml`
//! - macOS: `~/Library/Application Support/tablelink/config.toml`
//! - Windows: `%APPDATA%\tablelink\config.toml`

use crate::error::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default update period in milliseconds.
pub const DEFAULT_UPDATE_RATE_MS: u64 = 100;
/// Fastest accepted update period.
pub const MIN_UPDATE_RATE_MS: u64 = 50;
/// Slowest accepted update period.
pub const MAX_UPDATE_RATE_MS: u64 = 1000;
/// Default audio range in audio-space units.
pub const DEFAULT_AUDIO_RANGE: f32 = 50.0;
/// Default pixel-to-audio scale factor.
pub const DEFAULT_SCALE_MULTIPLIER: f32 = 0.1;
/// Well-known local endpoint of the relay.
pub const DEFAULT_RELAY_URL: &str = "ws://localhost:23456";

/// Which outbound channel carries link updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// WebSocket relay on a local port
    #[default]
    Relay,
    /// Direct shared-memory access from the host process
    Native,
}

/// Client-scoped positional audio settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether positional audio forwarding is enabled
    pub enabled: bool,
    /// Update period in milliseconds (50-1000)
    pub update_rate_ms: u64,
    /// Audio range in audio-space units
    pub audio_range: f32,
    /// Scale applied to pixel offsets from the scene centre
    pub scale_multiplier: f32,
    /// Relay endpoint used by the relay transport
    pub relay_url: String,
    /// Outbound transport
    pub transport: TransportKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            update_rate_ms: DEFAULT_UPDATE_RATE_MS,
            audio_range: DEFAULT_AUDIO_RANGE,
            scale_multiplier: DEFAULT_SCALE_MULTIPLIER,
            relay_url: DEFAULT_RELAY_URL.to_string(),
            transport: TransportKind::default(),
        }
    }
}

impl Settings {
    /// Load settings from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load settings from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings or return defaults if not found
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Save settings to the default config file location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "tablelink") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = r#"# tablelink configuration file

# Forward token positions to the positional audio consumer
enabled = true

# Update period in milliseconds (50-1000)
update_rate_ms = 100

# Audio range in audio-space units
audio_range = 50.0

# Scale applied to pixel offsets from the scene centre
scale_multiplier = 0.1

# Relay endpoint
relay_url = "ws://localhost:23456"

# Transport: "relay" or "native"
transport = "relay"
"#;

        fs::write(&path, content)?;
        Ok(path)
    }

    /// Update period clamped to the accepted range.
    pub fn clamped_update_rate_ms(&self) -> u64 {
        self.update_rate_ms
            .clamp(MIN_UPDATE_RATE_MS, MAX_UPDATE_RATE_MS)
    }

    /// Timer period for the update scheduler.
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.clamped_update_rate_ms())
    }
}

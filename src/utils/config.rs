//! Configuration management for gateplay
//!
//! This module handles loading and managing deployment configuration
//! from config files and environment variables. Every policy constant the
//! controller uses (seek tolerance, trust window, backoff, locator windows,
//! buffer profiles) lives here so deployments can tune them.

use crate::buffer::PreloadStrategy;
use crate::utils::error::{IntoPlayerError, PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gating, stuck detection and activity settings
    pub playback: PlaybackConfig,

    /// Retry backoff shape
    pub retry: RetryConfig,

    /// Time-boxed locator refresh
    pub locator: LocatorConfig,

    /// Buffer profiles per network quality
    pub buffer: BufferProfiles,

    /// General settings
    pub general: GeneralConfig,
}

/// Playback gating configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Forward seeks within this many seconds of the ratchet are allowed
    pub seek_tolerance_secs: f64,

    /// Largest progress delta trusted as a legitimate ratchet advance
    pub progress_trust_window_secs: f64,

    /// How long the gate ignores seek signals after snapping back
    pub seek_correction_hold_ms: u64,

    /// Interval of the stuck playback check
    pub stuck_check_interval_secs: u64,

    /// Minimum spacing of activity signals
    pub activity_throttle_secs: u64,

    /// Activity heartbeat for third-party embeds
    pub embed_heartbeat_secs: u64,
}

/// Retry backoff configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Multiplier applied per attempt
    pub backoff_factor: f64,

    /// Upper bound for a single backoff delay
    pub max_delay_ms: u64,
}

/// Validity window and refresh margin for one locator origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigningPolicy {
    /// Lifetime of a freshly issued locator
    pub validity_secs: u64,

    /// Refresh once remaining lifetime drops below this
    pub safety_margin_secs: u64,
}

/// Locator lifecycle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Interval of the expiry check
    pub check_interval_secs: u64,

    /// Locators pre-signed by the upstream storage service
    pub upstream: SigningPolicy,

    /// Locators signed by this deployment
    pub local: SigningPolicy,
}

/// Buffer thresholds for one network quality class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferProfile {
    pub min_buffer_secs: f64,
    pub smart_buffering_delay_ms: u64,
    pub buffering_state_delay_ms: u64,
    pub retry_base_delay_ms: u64,
    pub preload: PreloadStrategy,
}

/// Buffer profiles and device adjustments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferProfiles {
    pub good: BufferProfile,
    pub slow: BufferProfile,
    pub offline: BufferProfile,

    /// Retry budget on desktop class devices
    pub desktop_max_retries: u32,

    /// Retry budget on mobile class devices (flakier radios)
    pub mobile_max_retries: u32,

    /// Look-ahead cap on memory constrained devices
    pub low_memory_min_buffer_cap_secs: f64,
}

/// General configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            seek_tolerance_secs: 5.0,
            progress_trust_window_secs: 3.0,
            seek_correction_hold_ms: 150,
            stuck_check_interval_secs: 10,
            activity_throttle_secs: 10,
            embed_heartbeat_secs: 30,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_factor: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 60,
            upstream: SigningPolicy {
                validity_secs: 3600,
                safety_margin_secs: 300,
            },
            local: SigningPolicy {
                validity_secs: 86_400,
                safety_margin_secs: 600,
            },
        }
    }
}

impl Default for BufferProfiles {
    fn default() -> Self {
        Self {
            good: BufferProfile {
                min_buffer_secs: 10.0,
                smart_buffering_delay_ms: 2_000,
                buffering_state_delay_ms: 500,
                retry_base_delay_ms: 1_000,
                preload: PreloadStrategy::Auto,
            },
            slow: BufferProfile {
                min_buffer_secs: 20.0,
                smart_buffering_delay_ms: 5_000,
                buffering_state_delay_ms: 1_000,
                retry_base_delay_ms: 2_000,
                preload: PreloadStrategy::Metadata,
            },
            offline: BufferProfile {
                min_buffer_secs: 30.0,
                smart_buffering_delay_ms: 8_000,
                buffering_state_delay_ms: 1_500,
                retry_base_delay_ms: 4_000,
                preload: PreloadStrategy::None,
            },
            desktop_max_retries: 3,
            mobile_max_retries: 5,
            low_memory_min_buffer_cap_secs: 15.0,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from various sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. System config file (/etc/gateplay/config.toml on Linux)
    /// 3. User config file (~/.config/gateplay/config.toml on Linux)
    /// 4. Environment variables (GATEPLAY_* prefix)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(system_path) = Self::system_config_path() {
            if system_path.exists() {
                config = Self::from_file(&system_path)?;
            }
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                config = Self::from_file(&user_path)?;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Read a single TOML file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).config_err("Failed to read config file")?;
        toml::from_str(&contents).config_err("Failed to parse config file")
    }

    /// Save configuration to the user config file
    pub fn save(&self) -> Result<()> {
        let path = Self::user_config_path()
            .ok_or_else(|| PlayerError::Config("Cannot determine user config path".to_string()))?;
        self.save_to(&path)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).config_err("Failed to create config directory")?;
        }

        let toml = self.to_toml()?;
        std::fs::write(path, toml).config_err("Failed to write config file")?;

        Ok(())
    }

    /// Render as pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).config_err("Failed to serialize config")
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("GATEPLAY_SEEK_TOLERANCE_SECS") {
            self.playback.seek_tolerance_secs = value
                .parse()
                .map_err(|_| PlayerError::Config("Invalid GATEPLAY_SEEK_TOLERANCE_SECS".to_string()))?;
        }

        if let Ok(value) = std::env::var("GATEPLAY_TRUST_WINDOW_SECS") {
            self.playback.progress_trust_window_secs = value
                .parse()
                .map_err(|_| PlayerError::Config("Invalid GATEPLAY_TRUST_WINDOW_SECS".to_string()))?;
        }

        if let Ok(value) = std::env::var("GATEPLAY_MAX_RETRY_DELAY_MS") {
            self.retry.max_delay_ms = value
                .parse()
                .map_err(|_| PlayerError::Config("Invalid GATEPLAY_MAX_RETRY_DELAY_MS".to_string()))?;
        }

        if let Ok(log_level) = std::env::var("GATEPLAY_LOG_LEVEL") {
            self.general.log_level = log_level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.playback.seek_tolerance_secs < 0.0 {
            return Err(PlayerError::Config("Seek tolerance must not be negative".to_string()));
        }

        if self.playback.progress_trust_window_secs <= 0.0 {
            return Err(PlayerError::Config("Progress trust window must be positive".to_string()));
        }

        if self.playback.stuck_check_interval_secs == 0
            || self.locator.check_interval_secs == 0
            || self.playback.embed_heartbeat_secs == 0
        {
            return Err(PlayerError::Config("Check intervals must be non-zero".to_string()));
        }

        if self.retry.backoff_factor < 1.0 {
            return Err(PlayerError::Config("Backoff factor must be at least 1.0".to_string()));
        }

        for (name, policy) in [("upstream", &self.locator.upstream), ("local", &self.locator.local)] {
            if policy.safety_margin_secs >= policy.validity_secs {
                return Err(PlayerError::Config(format!(
                    "Locator {} safety margin must be shorter than its validity",
                    name
                )));
            }
        }

        if self.buffer.desktop_max_retries == 0 || self.buffer.mobile_max_retries == 0 {
            return Err(PlayerError::Config("Retry budgets must be non-zero".to_string()));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(PlayerError::Config(format!(
                "Invalid log level '{}', must be one of: {:?}",
                self.general.log_level, valid_log_levels
            )));
        }

        Ok(())
    }

    /// Get system config file path
    fn system_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return Some(PathBuf::from("/etc/gateplay/config.toml"));

        #[cfg(target_os = "windows")]
        return std::env::var("PROGRAMDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("Gateplay").join("config.toml"));

        #[cfg(target_os = "macos")]
        return Some(PathBuf::from("/Library/Application Support/Gateplay/config.toml"));

        #[allow(unreachable_code)]
        None
    }

    /// Get user config file path
    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gateplay").join("config.toml"))
    }
}

//! Selection of buffer thresholds from device class and link quality

use super::{BufferConfig, PreloadStrategy};
use crate::network::NetworkQuality;
use crate::utils::config::{BufferProfile, BufferProfiles, PlaybackConfig};
use log::debug;
use serde::{Deserialize, Serialize};

/// Devices with less memory than this are treated as constrained
const LOW_MEMORY_GB: f32 = 2.0;

/// Broad hardware class of the playback device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Desktop,
    Mobile,
}

/// Device signals relevant to buffering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub class: DeviceClass,
    /// Reported device memory, if the platform exposes it
    #[serde(default)]
    pub memory_gb: Option<f32>,
    /// User asked to reduce data usage
    #[serde(default)]
    pub save_data: bool,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            class: DeviceClass::Desktop,
            memory_gb: None,
            save_data: false,
        }
    }
}

impl DeviceProfile {
    fn is_low_memory(&self) -> bool {
        self.memory_gb.is_some_and(|gb| gb < LOW_MEMORY_GB)
    }
}

/// Derives a [`BufferConfig`] once per asset load
#[derive(Debug, Clone)]
pub struct BufferPolicySelector {
    profiles: BufferProfiles,
    seek_tolerance_secs: f64,
}

impl BufferPolicySelector {
    pub fn new(profiles: BufferProfiles, playback: &PlaybackConfig) -> Self {
        Self {
            profiles,
            seek_tolerance_secs: playback.seek_tolerance_secs,
        }
    }

    fn profile(&self, quality: NetworkQuality) -> &BufferProfile {
        match quality {
            NetworkQuality::Good => &self.profiles.good,
            NetworkQuality::Slow => &self.profiles.slow,
            NetworkQuality::Offline => &self.profiles.offline,
        }
    }

    pub fn select(&self, device: &DeviceProfile, quality: NetworkQuality) -> BufferConfig {
        let profile = self.profile(quality);

        let mut min_buffer_secs = profile.min_buffer_secs;
        if device.is_low_memory() {
            min_buffer_secs = min_buffer_secs.min(self.profiles.low_memory_min_buffer_cap_secs);
        }

        let max_retries = match device.class {
            DeviceClass::Desktop => self.profiles.desktop_max_retries,
            DeviceClass::Mobile => self.profiles.mobile_max_retries,
        };

        let preload = if device.save_data && profile.preload == PreloadStrategy::Auto {
            PreloadStrategy::Metadata
        } else {
            profile.preload
        };

        let config = BufferConfig {
            min_buffer_secs,
            smart_buffering_delay_ms: profile.smart_buffering_delay_ms,
            buffering_state_delay_ms: profile.buffering_state_delay_ms,
            max_retries,
            retry_base_delay_ms: profile.retry_base_delay_ms,
            seek_tolerance_secs: self.seek_tolerance_secs,
            preload,
        };
        debug!("Selected buffer config for {:?}/{:?}: {:?}", device.class, quality, config);
        config
    }
}

impl Default for BufferPolicySelector {
    fn default() -> Self {
        Self::new(BufferProfiles::default(), &PlaybackConfig::default())
    }
}

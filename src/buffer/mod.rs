//! Buffer policy for gateplay
//!
//! Derives per-asset buffering thresholds from device and network signals,
//! and computes look-ahead progress from the engine's buffered ranges.

mod policy;
mod progress;

pub use policy::{BufferPolicySelector, DeviceClass, DeviceProfile};
pub use progress::{buffer_progress_percent, buffered_ahead, target_buffer_secs, BufferStatus, TimeRange};

use serde::{Deserialize, Serialize};

/// Hint for how eagerly the engine should fetch media before playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadStrategy {
    /// Fetch nothing until asked to play
    None,

    /// Fetch only metadata (duration, dimensions)
    Metadata,

    /// Fetch as much as the engine sees fit
    Auto,
}

/// Buffering thresholds for one asset load
#[derive(Debug, Clone, PartialEq)]
pub struct BufferConfig {
    /// Look-ahead required before resuming from smart buffering
    pub min_buffer_secs: f64,

    /// Starvation tolerated before pausing into smart buffering
    pub smart_buffering_delay_ms: u64,

    /// Starvation tolerated before the buffering indicator is shown
    pub buffering_state_delay_ms: u64,

    /// Failed attempts allowed before giving up
    pub max_retries: u32,

    /// First retry delay; later ones grow exponentially
    pub retry_base_delay_ms: u64,

    /// Forward seeks within this distance of the ratchet are allowed
    pub seek_tolerance_secs: f64,

    pub preload: PreloadStrategy,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferPolicySelector::default().select(&DeviceProfile::default(), crate::network::NetworkQuality::Good)
    }
}

//! Session data for the playback controller

use crate::buffer::TimeRange;
use crate::engine::ReadyState;
use serde::{Deserialize, Serialize};

/// High-level playback state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// No media loaded
    Idle,

    Playing,

    Paused,

    /// Starved, within the tolerance window
    Waiting,

    /// Explicitly paused until enough is buffered
    SmartBuffering,

    /// Fetching stalled while playing, within the tolerance window
    Stalled,

    /// A reload is scheduled or in flight
    ErrorRetrying,

    /// Out of retries; only a manual retry or a new load leaves this state
    ErrorExhausted,
}

impl PlaybackState {
    /// Whether the viewer perceives playback as running
    pub fn is_playing(self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Waiting | PlaybackState::Stalled)
    }

    pub fn is_error(self) -> bool {
        matches!(self, PlaybackState::ErrorRetrying | PlaybackState::ErrorExhausted)
    }
}

/// Which playback path governs the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlaybackBackend {
    Native,
    Embedded { embed_url: String },
}

/// Identifies one `load()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SessionId(pub u64);

/// Options supplied with a source reference
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Gate forward seeks and hide native controls
    #[serde(default)]
    pub restricted_mode: bool,

    /// Resume point, applied once when metadata is available
    #[serde(default)]
    pub initial_position: Option<f64>,
}

impl LoadOptions {
    pub fn restricted() -> Self {
        Self {
            restricted_mode: true,
            initial_position: None,
        }
    }

    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn at(mut self, position: f64) -> Self {
        self.initial_position = Some(position);
        self
    }
}

/// Why a resolution was requested
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "purpose", rename_all = "snake_case")]
pub enum ResolvePurpose {
    /// First resolution after `load()`
    Initial,

    /// Retry or manual recovery, resuming at the given position
    Retry { resume_at: f64 },

    /// Proactive swap before the locator expires
    Refresh { resume_at: f64 },
}

/// Identifies one resolution request; answers for other tickets are stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolveTicket {
    pub session: SessionId,
    pub seq: u64,
}

/// A resolution the driver must perform and report back
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolveRequest {
    pub ticket: ResolveTicket,
    pub reference: String,
    pub purpose: ResolvePurpose,
}

/// Snapshot of one mounted asset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSession {
    pub id: SessionId,
    pub source_reference: String,
    pub resolved_url: Option<String>,
    pub backend: PlaybackBackend,
    pub restricted_mode: bool,
    pub current_time: f64,
    pub duration: f64,
    pub max_reached_position: f64,
    pub playback_state: PlaybackState,
    pub retry_count: u32,
    pub max_retries: u32,
    pub buffer_progress_percent: f64,
    pub buffered_ranges: Vec<TimeRange>,
    pub url_expiry_ms: Option<u64>,
    pub ready_state: ReadyState,
    /// Starved right now, whether or not the indicator is shown
    pub buffering: bool,
    /// Last persisted resume point
    pub resume_point: Option<f64>,
}

impl PlaybackSession {
    pub fn is_playing(&self) -> bool {
        self.playback_state.is_playing()
    }
}

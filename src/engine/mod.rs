//! Playback engine abstraction
//!
//! The controller drives exactly one media engine and listens to a closed
//! set of engine signals. Any binding (a native element, a custom decoder)
//! maps its own events onto [`EngineSignal`] and tags them with the
//! generation it was loaded with.

mod recording;

pub use recording::{EngineCommand, RecordingEngine};

use crate::buffer::{PreloadStrategy, TimeRange};
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};

/// Identifies one engine load. Signals from older generations are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct EngineGeneration(pub u64);

impl EngineGeneration {
    pub fn next(self) -> Self {
        EngineGeneration(self.0 + 1)
    }
}

/// How much media the engine holds around the current position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    #[default]
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

/// Engine fault classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Fetch aborted at the caller's request
    Aborted,
    Network,
    Decode,
    SourceNotSupported,
    Unknown,
}

/// A playback fault reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineFault {
    pub kind: FaultKind,
    #[serde(default)]
    pub message: String,
}

impl EngineFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether this fault should be handled by retrying
    pub fn is_recoverable(&self) -> bool {
        self.kind != FaultKind::Aborted
    }
}

/// Closed set of signals every engine binding reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineSignal {
    /// Duration and dimensions known; seeking is possible
    LoadedMetadata { duration: f64 },
    DurationChanged { duration: f64 },
    CanPlay,
    CanPlayThrough,
    Playing,
    Paused,
    /// Playback halted because the next frame is not available
    Waiting,
    /// Fetching stalled unexpectedly
    Stalled,
    /// A seek started; the engine already reports `target` as its position
    Seeking { target: f64 },
    Seeked { position: f64 },
    TimeUpdate { position: f64 },
    Progress { buffered: Vec<TimeRange> },
    RateChange { rate: f64 },
    Ended,
    Error { fault: EngineFault },
}

/// An engine signal tagged with the load it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEnvelope {
    pub generation: EngineGeneration,
    pub signal: EngineSignal,
}

impl SignalEnvelope {
    pub fn new(generation: EngineGeneration, signal: EngineSignal) -> Self {
        Self { generation, signal }
    }
}

/// The playback engine resource, owned exclusively by one controller
pub trait MediaEngine: Send {
    /// Start loading `url`; signals for this load carry `generation`
    fn load(&mut self, generation: EngineGeneration, url: &str, preload: PreloadStrategy) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn seek(&mut self, position: f64);

    fn set_playback_rate(&mut self, rate: f64);

    /// Show or hide the engine's own transport controls
    fn set_native_controls(&mut self, enabled: bool);

    /// Release the current media
    fn unload(&mut self);
}

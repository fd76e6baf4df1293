//! Player module for gateplay
//!
//! The playback session controller and the policies it wires together:
//! the progress gate, bounded retry, stuck playback detection and the
//! locator lifecycle. Everything here is single-threaded and sans-IO;
//! see [`crate::runtime`] for the async driver.

mod controller;
mod events;
mod gate;
mod locator;
mod retry;
mod state;
mod stuck;
mod timers;

pub use controller::PlaybackSessionController;
pub use events::{EventHandlers, EventLog, PlayerEvent, PlayerEventHandler};
pub use gate::{GatePolicy, ProgressGate, SeekVerdict};
pub use locator::LocatorLifecycleManager;
pub use retry::{RetryController, RetryDecision, RetryPolicy};
pub use state::{
    LoadOptions, PlaybackBackend, PlaybackSession, PlaybackState, ResolvePurpose, ResolveRequest, ResolveTicket,
    SessionId,
};
pub use stuck::{StuckCheckInput, StuckPlaybackDetector, StuckVerdict};
pub use timers::{TimerKind, Timers};

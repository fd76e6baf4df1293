//! gateplay - gated single-asset media playback
//!
//! Streams one audio/video asset at a time while enforcing "rewatch, but
//! don't skip ahead" for training content, riding out flaky networks with
//! smart buffering and bounded retries, and keeping time-boxed media
//! locators fresh for the whole viewing.
//!
//! The [`PlaybackSessionController`] is the entry point. It is sans-IO:
//! feed it engine signals, resolver answers and timer polls, or hand it
//! to [`PlayerRuntime`] to drive it on tokio.

pub mod buffer;
pub mod engine;
pub mod network;
pub mod player;
pub mod runtime;
pub mod source;
pub mod utils;

pub use engine::{EngineFault, EngineGeneration, EngineSignal, FaultKind, MediaEngine, SignalEnvelope};
pub use player::{LoadOptions, PlaybackSession, PlaybackSessionController, PlaybackState, PlayerEvent, PlayerEventHandler};
pub use runtime::{PlayerCommand, PlayerRuntime, RuntimeHandle};
pub use source::{ActivitySink, MediaLocatorResolver, ResolvedLocator};
pub use utils::{Config, PlayerError, Result};

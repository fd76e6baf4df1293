//! Observer plumbing between the controller and the host UI

use crate::network::NetworkQuality;
use crate::utils::error::PlaybackFailure;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Player event for external event handling
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// Playing or not, from the viewer's perspective
    PlayStateChanged { playing: bool },

    /// Position changed
    TimeUpdate { position: f64 },

    /// Media length became known or changed
    DurationKnown { duration: f64 },

    /// Position to persist so the viewer can resume later
    ResumePoint { position: f64 },

    BufferProgress { percent: f64 },

    /// Buffering indicator shown or hidden
    BufferingChanged { buffering: bool },

    /// A forward seek was snapped back
    SeekCorrected { requested: f64, corrected: f64 },

    RetryScheduled { attempt: u32, delay_ms: u64 },

    /// Playback resumed after one or more retries
    Recovered,

    /// Retries exhausted; a manual retry is available
    Failed(PlaybackFailure),

    LocatorRefreshed { expiry_ms: Option<u64> },

    /// Playback was delegated to a third-party embed
    EmbedReady { embed_url: String },

    NetworkQualityChanged { quality: NetworkQuality },

    /// End of media reached
    Completed,
}

/// Player event handler trait
pub trait PlayerEventHandler: Send {
    fn handle_event(&mut self, event: &PlayerEvent);
}

impl<F> PlayerEventHandler for F
where
    F: FnMut(&PlayerEvent) + Send,
{
    fn handle_event(&mut self, event: &PlayerEvent) {
        self(event)
    }
}

/// The latest set of observer handles, owned by the controller
#[derive(Default)]
pub struct EventHandlers {
    handlers: Vec<Box<dyn PlayerEventHandler>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, handler: Box<dyn PlayerEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn emit(&mut self, event: PlayerEvent) {
        for handler in &mut self.handlers {
            handler.handle_event(&event);
        }
    }
}

/// Collects events; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<PlayerEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler that appends to this log
    pub fn handler(&self) -> Box<dyn PlayerEventHandler> {
        let events = Arc::clone(&self.events);
        Box::new(move |event: &PlayerEvent| events.lock().push(event.clone()))
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<PlayerEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn contains(&self, event: &PlayerEvent) -> bool {
        self.events.lock().contains(event)
    }

    pub fn count(&self, predicate: impl Fn(&PlayerEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn last(&self) -> Option<PlayerEvent> {
        self.events.lock().last().cloned()
    }
}

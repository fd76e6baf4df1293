//! Integration test utilities for gateplay
//!
//! This module provides common utilities for integration testing:
//! - A harness that drives the controller with a manual clock
//! - Recorded engine commands and emitted events
//! - Scripted playback helpers

use anyhow::{Context, Result};
use gateplay::buffer::TimeRange;
use gateplay::engine::{EngineCommand, EngineFault, EngineSignal, FaultKind, RecordingEngine, SignalEnvelope};
use gateplay::player::{EventLog, LoadOptions, PlaybackSession, PlaybackSessionController, ResolveRequest};
use gateplay::source::{LocatorOrigin, ResolvedLocator};
use gateplay::utils::{Config, ManualClock, PlayerError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Clock origin used by every harness
pub const START_MS: u64 = 1_700_000_000_000;

/// Controller wired to a manual clock and a recording engine
pub struct Harness {
    pub controller: PlaybackSessionController,
    pub engine: RecordingEngine,
    pub clock: ManualClock,
    pub events: EventLog,
    activity: Arc<AtomicU32>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let engine = RecordingEngine::new();
        let clock = ManualClock::new(START_MS);
        let events = EventLog::new();
        let activity = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&activity);

        let mut controller = PlaybackSessionController::new(
            config,
            Box::new(engine.clone()),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            Arc::new(clock.clone()),
        );
        controller.add_event_handler(events.handler());

        Self {
            controller,
            engine,
            clock,
            events,
            activity,
        }
    }

    /// Activity signals forwarded so far
    pub fn activity_count(&self) -> u32 {
        self.activity.load(Ordering::SeqCst)
    }

    pub fn session(&self) -> PlaybackSession {
        self.controller.session().expect("a session is loaded")
    }

    pub fn take_requests(&mut self) -> Vec<ResolveRequest> {
        self.controller.take_resolve_requests()
    }

    /// Answer pending resolutions with a direct CDN locator
    pub fn resolve_direct(&mut self) {
        for request in self.take_requests() {
            let url = format!("https://cdn.test/{}", request.reference);
            self.controller.on_resolved(request.ticket, Ok(ResolvedLocator::direct(url)));
        }
    }

    /// Answer pending resolutions with an upstream-signed locator
    pub fn resolve_signed(&mut self, expiry_ms: u64) {
        for request in self.take_requests() {
            let locator = ResolvedLocator {
                url: format!("https://cdn.test/{}?expires={}", request.reference, expiry_ms),
                origin: LocatorOrigin::UpstreamSigned,
                expiry_ms: Some(expiry_ms),
            };
            self.controller.on_resolved(request.ticket, Ok(locator));
        }
    }

    pub fn fail_resolution(&mut self, message: &str) {
        for request in self.take_requests() {
            self.controller
                .on_resolved(request.ticket, Err(PlayerError::resolution_error(message)));
        }
    }

    /// Deliver a signal for the current engine load
    pub fn signal(&mut self, signal: EngineSignal) -> bool {
        let generation = self.controller.current_generation();
        self.controller.handle_signal(SignalEnvelope::new(generation, signal))
    }

    /// Deliver a JSON array of engine signals in order; returns how many were current
    pub fn replay(&mut self, script: &str) -> Result<usize> {
        let signals: Vec<EngineSignal> = serde_json::from_str(script).context("parsing signal script")?;
        Ok(signals.into_iter().filter(|signal| self.signal(signal.clone())).count())
    }

    pub fn fault(&mut self, kind: FaultKind) {
        self.signal(EngineSignal::Error {
            fault: EngineFault::new(kind, "injected"),
        });
    }

    pub fn buffered(&mut self, start: f64, end: f64) {
        self.signal(EngineSignal::Progress {
            buffered: vec![TimeRange::new(start, end)],
        });
    }

    /// Advance the clock and fire due timers; returns how many fired
    pub fn advance(&mut self, ms: u64) -> usize {
        self.clock.advance(ms);
        self.controller.poll_timers()
    }

    /// Progress reports in quarter-second steps
    pub fn play_to(&mut self, from: f64, to: f64) {
        let mut t = from;
        while t < to {
            t = (t + 0.25).min(to);
            self.signal(EngineSignal::TimeUpdate { position: t });
        }
    }

    /// Load, resolve, buffer and start playing a `duration`-second asset
    pub fn start(&mut self, reference: &str, options: LoadOptions, duration: f64) {
        self.controller.load(reference, options);
        self.resolve_direct();
        self.signal(EngineSignal::LoadedMetadata { duration });
        self.buffered(0.0, duration.min(30.0));
        self.controller.play().expect("play");
        self.signal(EngineSignal::CanPlayThrough);
        self.signal(EngineSignal::Playing);
    }

    /// Engine commands of one kind
    pub fn count_commands(&self, predicate: impl Fn(&EngineCommand) -> bool) -> usize {
        self.engine.commands().iter().filter(|c| predicate(c)).count()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

//! Deadline table for the controller's delayed work
//!
//! One pending deadline per kind; scheduling a kind again replaces it.
//! Deadlines are absolute Unix epoch millis from the controller's clock.

use std::collections::HashMap;

/// Every kind of delayed work the controller schedules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    /// Starvation outlasted the tolerance window
    BufferEscalation,

    /// Starvation outlasted the indicator delay
    BufferingIndicator,

    /// Backoff elapsed, reload the asset
    RetryReload,

    /// Periodic stuck playback check
    StuckCheck,

    /// Periodic locator expiry check
    LocatorCheck,

    /// End of the gate's self-correction hold
    SeekCorrectionRelease,

    /// Activity heartbeat for embedded playback
    EmbedHeartbeat,
}

#[derive(Debug, Default)]
pub struct Timers {
    deadlines: HashMap<TimerKind, u64>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, kind: TimerKind, due_ms: u64) {
        self.deadlines.insert(kind, due_ms);
    }

    /// Schedule only if nothing of this kind is pending
    pub fn schedule_if_idle(&mut self, kind: TimerKind, due_ms: u64) -> bool {
        if self.deadlines.contains_key(&kind) {
            return false;
        }
        self.deadlines.insert(kind, due_ms);
        true
    }

    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.deadlines.remove(&kind).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.deadlines.clear();
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.deadlines.contains_key(&kind)
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.deadlines.values().min().copied()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    /// Remove and return every kind due at `now_ms`, earliest first
    pub fn take_due(&mut self, now_ms: u64) -> Vec<TimerKind> {
        let mut due: Vec<(u64, TimerKind)> = self
            .deadlines
            .iter()
            .filter(|(_, &at)| at <= now_ms)
            .map(|(&kind, &at)| (at, kind))
            .collect();
        due.sort();

        for (_, kind) in &due {
            self.deadlines.remove(kind);
        }
        due.into_iter().map(|(_, kind)| kind).collect()
    }
}

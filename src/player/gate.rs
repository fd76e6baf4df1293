//! Progress gate: rewatching is allowed, skipping ahead is not.
//!
//! The gate keeps a ratchet at the furthest position reached through
//! trusted forward progress. In restricted mode, seeks past the ratchet
//! plus a tolerance are snapped back to it.

use log::debug;

/// Tunables for the gate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatePolicy {
    /// Forward seeks within this distance of the ratchet are allowed
    pub tolerance_secs: f64,

    /// Largest progress delta trusted as normal playback
    pub trust_window_secs: f64,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            tolerance_secs: 5.0,
            trust_window_secs: 3.0,
        }
    }
}

/// Outcome of a seek attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekVerdict {
    /// Not evaluated (self-initiated correction, or mid-buffering)
    Ignored,

    Allowed,

    /// Snap back to `to`
    Corrected { to: f64 },
}

#[derive(Debug, Clone)]
pub struct ProgressGate {
    policy: GatePolicy,
    restricted: bool,
    max_reached: f64,
    last_position: f64,
    correcting: bool,
}

impl ProgressGate {
    pub fn new(policy: GatePolicy, restricted: bool) -> Self {
        Self {
            policy,
            restricted,
            max_reached: 0.0,
            last_position: 0.0,
            correcting: false,
        }
    }

    pub fn max_reached(&self) -> f64 {
        self.max_reached
    }

    pub fn is_correcting(&self) -> bool {
        self.correcting
    }

    fn raise(&mut self, position: f64) -> bool {
        if position > self.max_reached {
            self.max_reached = position;
            true
        } else {
            false
        }
    }

    /// Normal progress report. Returns whether the ratchet moved.
    pub fn on_progress(&mut self, position: f64, buffering: bool) -> bool {
        let delta = position - self.last_position;
        let trusted = buffering || (0.0..=self.policy.trust_window_secs).contains(&delta);

        if trusted {
            self.last_position = position;
            return self.raise(position);
        }

        if position <= self.max_reached {
            self.last_position = position;
        } else {
            debug!(
                "Untrusted progress jump {:.2}s -> {:.2}s, ratchet stays at {:.2}s",
                self.last_position, position, self.max_reached
            );
        }
        false
    }

    /// Evaluate a seek the controller did not initiate
    pub fn on_seek(&mut self, target: f64, buffering: bool) -> SeekVerdict {
        if self.correcting || buffering {
            return SeekVerdict::Ignored;
        }

        if self.restricted && target > self.max_reached + self.policy.tolerance_secs {
            debug!("Seek to {:.2}s vetoed, snapping back to {:.2}s", target, self.max_reached);
            self.correcting = true;
            self.last_position = self.max_reached;
            return SeekVerdict::Corrected { to: self.max_reached };
        }

        self.last_position = target;
        SeekVerdict::Allowed
    }

    /// The controller is about to move the engine itself; the seek
    /// signals it causes are not user attempts.
    pub fn begin_internal_seek(&mut self, target: f64) {
        self.correcting = true;
        self.last_position = target;
    }

    pub fn release_correction(&mut self) {
        self.correcting = false;
    }

    /// Data resumed after starvation at `position`
    pub fn resync(&mut self, position: f64) {
        self.last_position = position;
        self.raise(position);
    }

    /// A resume point handed in by the caller counts as reached
    pub fn seed(&mut self, position: f64) {
        self.last_position = position;
        self.raise(position);
    }

    /// Position to persist as the resume point on pause
    pub fn on_pause(&self, position: f64) -> f64 {
        position.max(0.0)
    }

    /// Playback ran to the end
    pub fn complete(&mut self, duration: f64) {
        if duration.is_finite() && duration > 0.0 {
            self.last_position = duration;
            self.raise(duration);
        }
    }
}

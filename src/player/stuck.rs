//! Detects "playing" sessions whose position stopped moving

use crate::engine::ReadyState;
use log::warn;

/// Positions closer than this count as unchanged
const POSITION_EPSILON_SECS: f64 = 0.01;

/// What the detector sees at one periodic check
#[derive(Debug, Clone, Copy)]
pub struct StuckCheckInput {
    pub position: f64,
    pub playing: bool,
    pub buffering: bool,
    pub visible: bool,
    pub ready_state: ReadyState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuckVerdict {
    /// A legitimate reason for standing still
    Skipped,
    Advancing,
    Stuck,
}

#[derive(Debug, Clone, Default)]
pub struct StuckPlaybackDetector {
    last_position: Option<f64>,
}

impl StuckPlaybackDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.last_position = None;
    }

    pub fn check(&mut self, input: StuckCheckInput) -> StuckVerdict {
        if !input.playing || input.buffering || !input.visible {
            // a stale sample from before the pause would look stuck right after resuming
            self.last_position = None;
            return StuckVerdict::Skipped;
        }

        let unchanged = self
            .last_position
            .is_some_and(|last| (last - input.position).abs() < POSITION_EPSILON_SECS);

        if unchanged && input.position > 0.0 && input.ready_state >= ReadyState::HaveFutureData {
            warn!("Playback stuck at {:.2}s with data available", input.position);
            self.last_position = None;
            return StuckVerdict::Stuck;
        }

        self.last_position = Some(input.position);
        StuckVerdict::Advancing
    }
}

//! Look-ahead computation over buffered time ranges

use crate::utils::clamp;
use serde::{Deserialize, Serialize};

/// Ranges whose start is this close ahead of the position still count as
/// containing it (engines report ranges with small gaps after a seek).
const RANGE_EDGE_EPSILON_SECS: f64 = 0.5;

/// A downloaded interval of media, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    fn contains(&self, position: f64) -> bool {
        self.start <= position + RANGE_EDGE_EPSILON_SECS && position <= self.end
    }
}

/// Seconds of contiguous media buffered ahead of `position`
pub fn buffered_ahead(ranges: &[TimeRange], position: f64) -> f64 {
    ranges
        .iter()
        .filter(|r| r.end.is_finite() && r.contains(position))
        .map(|r| r.end - position)
        .fold(0.0, f64::max)
}

/// Look-ahead needed: `min(min_buffer, remaining)`. Unknown duration
/// falls back to `min_buffer`.
pub fn target_buffer_secs(min_buffer_secs: f64, duration: f64, position: f64) -> f64 {
    if !duration.is_finite() || duration <= 0.0 {
        return min_buffer_secs;
    }
    min_buffer_secs.min((duration - position).max(0.0))
}

/// `clamp(0, 100, 100 * ahead / target)`; a zero target is fully buffered
pub fn buffer_progress_percent(ahead_secs: f64, target_secs: f64) -> f64 {
    if target_secs <= 0.0 {
        return 100.0;
    }
    let percent = 100.0 * ahead_secs / target_secs;
    if percent.is_nan() {
        return 0.0;
    }
    clamp(percent, 0.0, 100.0)
}

/// Buffer health at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BufferStatus {
    pub percent: f64,
    pub ahead_secs: f64,
    pub target_secs: f64,
    /// Enough is buffered to start or resume playback
    pub satisfied: bool,
}

impl BufferStatus {
    pub fn compute(ranges: &[TimeRange], position: f64, duration: f64, min_buffer_secs: f64) -> Self {
        let ahead_secs = buffered_ahead(ranges, position);
        let target_secs = target_buffer_secs(min_buffer_secs, duration, position);
        let percent = buffer_progress_percent(ahead_secs, target_secs);
        let covers_rest = duration.is_finite() && duration > 0.0 && position + ahead_secs >= duration;

        Self {
            percent,
            ahead_secs,
            target_secs,
            satisfied: percent >= 100.0 || covers_rest,
        }
    }
}

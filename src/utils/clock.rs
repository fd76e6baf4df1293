//! Wall clocks used by the controller
//!
//! All timestamps are Unix epoch milliseconds so locator expiries coming
//! from signing services and local timer deadlines share one scale.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" for timers and expiry checks
pub trait Clock: Send + Sync {
    /// Current time in Unix epoch milliseconds
    fn now_ms(&self) -> u64;
}

/// Real wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for tests and scenario replay
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Wall clock anchored once and then advanced by tokio's clock.
///
/// Follows `tokio::time::pause`/`advance`, which keeps timer tests
/// deterministic when the runtime drives the controller.
#[derive(Debug)]
pub struct TokioClock {
    anchor: Mutex<Option<(u64, tokio::time::Instant)>>,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            anchor: Mutex::new(None),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        let mut anchor = self.anchor.lock();
        let (wall_ms, instant) =
            *anchor.get_or_insert_with(|| (SystemClock.now_ms(), tokio::time::Instant::now()));
        wall_ms + instant.elapsed().as_millis() as u64
    }
}

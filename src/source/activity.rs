//! Activity signalling that keeps the host session alive during playback

use log::debug;

/// Receives "user is still active" pings
pub trait ActivitySink: Send {
    fn signal_activity(&mut self);
}

impl<F> ActivitySink for F
where
    F: FnMut() + Send,
{
    fn signal_activity(&mut self) {
        self()
    }
}

/// Sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingActivitySink;

impl ActivitySink for LoggingActivitySink {
    fn signal_activity(&mut self) {
        debug!("Activity signal");
    }
}

/// Forwards at most one signal per window
pub struct ActivityThrottle {
    sink: Box<dyn ActivitySink>,
    window_ms: u64,
    last_sent_ms: Option<u64>,
}

impl ActivityThrottle {
    pub fn new(sink: Box<dyn ActivitySink>, window_ms: u64) -> Self {
        Self {
            sink,
            window_ms,
            last_sent_ms: None,
        }
    }

    /// Forward a signal unless one was sent within the window.
    /// Returns whether the sink was called.
    pub fn signal(&mut self, now_ms: u64) -> bool {
        if let Some(last) = self.last_sent_ms {
            if now_ms.saturating_sub(last) < self.window_ms {
                return false;
            }
        }
        self.last_sent_ms = Some(now_ms);
        self.sink.signal_activity();
        true
    }
}

//! Lifecycle of time-boxed media locators
//!
//! Tracks when the current locator expires and decides when to swap it
//! for a fresh one. Each origin has its own validity window (used when the
//! resolver does not state an expiry) and its own safety margin.

use crate::source::{LocatorOrigin, ResolvedLocator};
use crate::utils::config::{LocatorConfig, SigningPolicy};
use log::{debug, info};

#[derive(Debug, Clone)]
pub struct LocatorLifecycleManager {
    config: LocatorConfig,
    origin: LocatorOrigin,
    expiry_ms: Option<u64>,
    /// Position captured when a refresh began
    captured_position: Option<f64>,
    /// Expiry of the locator being replaced, kept in case the refresh fails
    replaced_expiry_ms: Option<u64>,
}

impl LocatorLifecycleManager {
    pub fn new(config: LocatorConfig) -> Self {
        Self {
            config,
            origin: LocatorOrigin::Direct,
            expiry_ms: None,
            captured_position: None,
            replaced_expiry_ms: None,
        }
    }

    fn policy(&self, origin: LocatorOrigin) -> &SigningPolicy {
        match origin {
            LocatorOrigin::LocallySigned => &self.config.local,
            LocatorOrigin::UpstreamSigned | LocatorOrigin::Direct => &self.config.upstream,
        }
    }

    pub fn check_interval_ms(&self) -> u64 {
        self.config.check_interval_secs * 1000
    }

    pub fn expiry_ms(&self) -> Option<u64> {
        self.expiry_ms
    }

    pub fn is_refreshing(&self) -> bool {
        self.captured_position.is_some()
    }

    /// Adopt a freshly resolved locator; returns its effective expiry
    pub fn accept(&mut self, locator: &ResolvedLocator, now_ms: u64) -> Option<u64> {
        self.origin = locator.origin;
        self.expiry_ms = match (locator.origin, locator.expiry_ms) {
            (_, Some(expiry)) => Some(expiry),
            (LocatorOrigin::Direct, None) => None,
            (origin, None) => Some(now_ms + self.policy(origin).validity_secs * 1000),
        };
        self.replaced_expiry_ms = None;
        debug!("Locator accepted ({:?}), expires at {:?}", self.origin, self.expiry_ms);
        self.expiry_ms
    }

    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.expiry_ms.map(|expiry| expiry.saturating_sub(now_ms))
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expiry_ms.is_some_and(|expiry| now_ms >= expiry)
    }

    /// Remaining lifetime dropped below the origin's safety margin
    pub fn needs_refresh(&self, now_ms: u64) -> bool {
        if self.is_refreshing() {
            return false;
        }
        let margin_ms = self.policy(self.origin).safety_margin_secs * 1000;
        self.remaining_ms(now_ms).is_some_and(|remaining| remaining < margin_ms)
    }

    /// Invalidate the current locator and remember where playback was
    pub fn begin_refresh(&mut self, position: f64) {
        info!("Refreshing media locator at {:.2}s", position);
        self.captured_position = Some(position);
        self.replaced_expiry_ms = self.expiry_ms.take();
    }

    /// The refresh resolved; returns the captured position
    pub fn finish_refresh(&mut self) -> Option<f64> {
        self.captured_position.take()
    }

    /// The refresh failed; keep using the old locator until the next check
    pub fn abandon_refresh(&mut self) {
        self.captured_position = None;
        self.expiry_ms = self.replaced_expiry_ms.take();
    }

    pub fn clear(&mut self) {
        self.origin = LocatorOrigin::Direct;
        self.expiry_ms = None;
        self.captured_position = None;
        self.replaced_expiry_ms = None;
    }
}

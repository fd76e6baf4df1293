//! Media locator resolution interface

use crate::utils::error::{PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Where a playable URL came from; decides its validity window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorOrigin {
    /// Plain URL with no expiry
    Direct,

    /// Pre-signed by the upstream storage service
    UpstreamSigned,

    /// Signed by this deployment
    LocallySigned,
}

/// A playable URL, possibly time-boxed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocator {
    pub url: String,
    pub origin: LocatorOrigin,
    /// Unix epoch millis after which the URL stops working. When absent
    /// for a signed origin, the validity window of that origin applies.
    #[serde(default)]
    pub expiry_ms: Option<u64>,
}

impl ResolvedLocator {
    /// An unsigned locator for a reference that is playable as-is
    pub fn direct(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            origin: LocatorOrigin::Direct,
            expiry_ms: None,
        }
    }
}

/// Future returned by a resolver
pub type ResolveFuture = Pin<Box<dyn Future<Output = Result<ResolvedLocator>> + Send + 'static>>;

/// Turns a raw source reference into a playable locator.
///
/// Must be idempotent; the controller may call it again for the same
/// reference on retry or expiry refresh.
pub trait MediaLocatorResolver: Send + Sync {
    fn resolve(&self, reference: &str) -> ResolveFuture;
}

/// Table-driven resolver. Unknown references fail resolution.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<String, ResolvedLocator>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, reference: impl Into<String>, locator: ResolvedLocator) -> Self {
        self.entries.insert(reference.into(), locator);
        self
    }

    pub fn lookup(&self, reference: &str) -> Result<ResolvedLocator> {
        self.entries
            .get(reference)
            .cloned()
            .ok_or_else(|| PlayerError::resolution_error(format!("no locator for '{}'", reference)))
    }
}

impl MediaLocatorResolver for StaticResolver {
    fn resolve(&self, reference: &str) -> ResolveFuture {
        let result = self.lookup(reference);
        Box::pin(async move { result })
    }
}

//! Error types for gateplay
//!
//! This module defines custom error types used throughout the crate.
//! We use thiserror for convenient error type definitions and anyhow for
//! application-level error handling in the binary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for gateplay
#[derive(Error, Debug)]
pub enum PlayerError {
    /// Media engine errors
    #[error("Engine error: {0}")]
    Engine(String),

    /// Locator resolution errors
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No source has been loaded
    #[error("No media source loaded")]
    NoSource,

    /// The runtime event loop is gone
    #[error("Player runtime is not running")]
    ChannelClosed,
}

impl PlayerError {
    /// Create a resolution error from string
    pub fn resolution_error<S: Into<String>>(msg: S) -> Self {
        PlayerError::Resolution(msg.into())
    }
}

/// Convenience type alias for Results in gateplay
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Extension trait for converting other errors to PlayerError
pub trait IntoPlayerError<T> {
    /// Convert this error into a configuration error with the given context
    fn config_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoPlayerError<T> for std::result::Result<T, E> {
    fn config_err(self, context: &str) -> Result<T> {
        self.map_err(|e| PlayerError::Config(format!("{}: {}", context, e)))
    }
}

/// Why playback could not be recovered automatically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The device reported no connectivity when retries ran out
    NetworkOffline,

    /// Neither the resolved locator nor the raw reference would play
    SourceUnavailable,

    /// Generic playback fault after exhausting retries
    Playback,
}

/// User-facing failure surfaced to the host UI.
///
/// Always recoverable through a manual retry; the last position is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Number of failed attempts that led here
    pub attempts: u32,
}

impl PlaybackFailure {
    /// Short message suitable for rendering next to a retry button
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            FailureKind::NetworkOffline => "You appear to be offline. Reconnect and try again.",
            FailureKind::SourceUnavailable => "This media could not be loaded.",
            FailureKind::Playback => "Playback failed. Please try again.",
        }
    }
}

//! Media sources
//!
//! Classifies raw source references into natively played media or
//! third-party hosted embeds, and defines the external collaborators the
//! controller consumes: the locator resolver and the activity sink.

mod activity;
mod resolver;

pub use activity::{ActivitySink, ActivityThrottle, LoggingActivitySink};
pub use resolver::{LocatorOrigin, MediaLocatorResolver, ResolveFuture, ResolvedLocator, StaticResolver};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static YOUTUBE_ID: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.|m\.)?(?:youtube\.com/(?:watch\?(?:.*&)?v=|embed/|shorts/)|youtu\.be/)([A-Za-z0-9_-]{11})")
        .ok()
});

static VIMEO_ID: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(?:https?://)?(?:www\.)?(?:player\.)?vimeo\.com/(?:video/)?(\d+)").ok());

/// Hosting service of an embedded video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedProvider {
    YouTube,
    Vimeo,
}

/// How a source reference is played
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Played by the owned media engine
    Native,

    /// Delegated to the provider's own player
    Embedded { provider: EmbedProvider, video_id: String },
}

impl SourceKind {
    pub fn classify(reference: &str) -> Self {
        let reference = reference.trim();

        let captured = |pattern: &Lazy<Option<Regex>>| {
            pattern
                .as_ref()
                .and_then(|re| re.captures(reference))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        };

        if let Some(video_id) = captured(&YOUTUBE_ID) {
            return SourceKind::Embedded {
                provider: EmbedProvider::YouTube,
                video_id,
            };
        }

        if let Some(video_id) = captured(&VIMEO_ID) {
            return SourceKind::Embedded {
                provider: EmbedProvider::Vimeo,
                video_id,
            };
        }

        SourceKind::Native
    }

    /// Canonical embed URL for embedded sources
    pub fn embed_url(&self) -> Option<String> {
        match self {
            SourceKind::Native => None,
            SourceKind::Embedded {
                provider: EmbedProvider::YouTube,
                video_id,
            } => Some(format!("https://www.youtube.com/embed/{}", video_id)),
            SourceKind::Embedded {
                provider: EmbedProvider::Vimeo,
                video_id,
            } => Some(format!("https://player.vimeo.com/video/{}", video_id)),
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, SourceKind::Embedded { .. })
    }
}

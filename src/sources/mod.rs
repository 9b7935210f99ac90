//! # Sources Module
//!
//! Turns user supplied media URLs into playable [`Track`]s.
//!
//! - [`MediaResolver`] is the seam to the extraction backend (network bound,
//!   possibly slow). [`youtube::YtDlpResolver`] implements it on top of `yt-dlp`.
//! - [`adapter::TrackResolver`] validates and classifies URLs, resolves single
//!   tracks, and splits playlists into a first track plus a remainder that is
//!   resolved in the background.

pub mod adapter;
pub mod youtube;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use adapter::{MediaKind, Outcome, PendingEntries, TrackResolver};
pub use youtube::YtDlpResolver;

/// Resolved media reference. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    locator: String,
    duration: Option<Duration>,
}

impl Track {
    pub fn new(title: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            locator: locator.into(),
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Playable stream URI handed to the audio sink.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

/// Extraction backend used by [`TrackResolver`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Pure pattern check against the supported host formats.
    fn is_recognized_url(&self, url: &str) -> bool;

    /// Live availability check. `Ok(false)` means the media exists in URL form
    /// but is deleted, private or blocked.
    async fn probe(&self, url: &str) -> Result<bool>;

    /// Resolves a single media URL into a track with a playable locator.
    async fn resolve(&self, url: &str) -> Result<Track>;

    /// Shallow playlist listing: entry URLs only, nothing resolved yet.
    async fn resolve_listing(&self, url: &str) -> Result<Vec<String>>;
}

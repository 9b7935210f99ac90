use regex::Regex;
use std::sync::{Arc, LazyLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{MediaResolver, Track};

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").expect("video id pattern is valid"));
static PLAYLIST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"list=([^&]+)").expect("playlist id pattern is valid"));

/// Shape of a media URL, decided purely from the URL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Playlist,
    Short,
    Mix,
    Music,
}

impl MediaKind {
    /// First match wins: `music`, `radio`, `short`, `playlist`, else video.
    pub fn classify(url: &str) -> Self {
        if url.contains("music") {
            MediaKind::Music
        } else if url.contains("radio") {
            MediaKind::Mix
        } else if url.contains("short") {
            MediaKind::Short
        } else if url.contains("playlist") {
            MediaKind::Playlist
        } else {
            MediaKind::Video
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Playlist => "playlist",
            MediaKind::Short => "short",
            MediaKind::Mix => "mix",
            MediaKind::Music => "music",
        }
    }
}

/// `https://www.youtube.com/watch?v=<id>` for any URL carrying an 11 character video id.
pub fn normalize_video_url(url: &str) -> Option<String> {
    VIDEO_ID
        .captures(url)
        .map(|caps| format!("https://www.youtube.com/watch?v={}", &caps[1]))
}

/// `https://www.youtube.com/playlist?list=<id>` for any URL carrying a `list=` parameter.
pub fn normalize_playlist_url(url: &str) -> Option<String> {
    PLAYLIST_ID
        .captures(url)
        .map(|caps| format!("https://www.youtube.com/playlist?list={}", &caps[1]))
}

/// Playlist entries not resolved yet, in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingEntries {
    entries: Vec<String>,
}

impl PendingEntries {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of [`TrackResolver::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Single(Track),
    /// First entry already resolved; the rest still has to be fetched.
    Playlist {
        first: Track,
        remainder: PendingEntries,
    },
    /// Unrecognized, malformed or unavailable URL.
    Invalid,
    /// Recognized URL whose extraction failed.
    Failed,
}

/// Validates, classifies and resolves user supplied URLs.
///
/// All methods perform network work and must be awaited outside a session's
/// serialized command loop.
pub struct TrackResolver {
    media: Arc<dyn MediaResolver>,
}

impl TrackResolver {
    pub fn new(media: Arc<dyn MediaResolver>) -> Self {
        Self { media }
    }

    pub async fn resolve(&self, url: &str) -> Outcome {
        let url = url.trim();

        if !self.media.is_recognized_url(url) {
            debug!("unrecognized url: {}", url);
            return Outcome::Invalid;
        }

        match self.media.probe(url).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("media unavailable: {}", url);
                return Outcome::Invalid;
            }
            Err(e) => {
                warn!("probe failed for {}: {:?}", url, e);
                return Outcome::Failed;
            }
        }

        let kind = MediaKind::classify(url);
        debug!("{} classified as {}", url, kind.as_str());

        match kind {
            MediaKind::Playlist => match normalize_playlist_url(url) {
                Some(list_url) => self.resolve_playlist(&list_url).await,
                None => Outcome::Invalid,
            },
            MediaKind::Video => match normalize_video_url(url) {
                Some(video_url) => self.resolve_single(&video_url).await,
                None => Outcome::Invalid,
            },
            MediaKind::Short | MediaKind::Mix | MediaKind::Music => self.resolve_single(url).await,
        }
    }

    async fn resolve_single(&self, url: &str) -> Outcome {
        match self.media.resolve(url).await {
            Ok(track) => Outcome::Single(track),
            Err(e) => {
                warn!("can't extract info from {}: {:?}", url, e);
                Outcome::Failed
            }
        }
    }

    /// Lists the playlist and resolves entries only until one succeeds.
    async fn resolve_playlist(&self, url: &str) -> Outcome {
        let listing = match self.media.resolve_listing(url).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!("can't list playlist {}: {:?}", url, e);
                return Outcome::Failed;
            }
        };

        let mut entries = listing.into_iter();
        while let Some(locator) = entries.next() {
            match self.media.resolve(&locator).await {
                Ok(first) => {
                    let remainder = PendingEntries::new(entries.collect());
                    info!(
                        "playlist {} starts with {} ({} more pending)",
                        url,
                        first.title(),
                        remainder.len()
                    );
                    return Outcome::Playlist { first, remainder };
                }
                Err(e) => warn!("skipping unplayable playlist entry {}: {:?}", locator, e),
            }
        }

        warn!("playlist {} has no playable entries", url);
        Outcome::Failed
    }

    /// Resolves the pending entries one by one, handing each track to `deliver`.
    ///
    /// `cancel` is checked between entries. Stops at the first extraction
    /// error, or when `deliver` returns `false`. Returns how many tracks were
    /// delivered.
    pub async fn resolve_remainder<F>(
        &self,
        pending: PendingEntries,
        cancel: CancellationToken,
        mut deliver: F,
    ) -> usize
    where
        F: FnMut(Track) -> bool + Send,
    {
        let total = pending.len();
        let mut delivered = 0;

        for locator in pending.entries {
            if cancel.is_cancelled() {
                debug!("playlist continuation cancelled after {} of {}", delivered, total);
                return delivered;
            }

            let track = match self.media.resolve(&locator).await {
                Ok(track) => track,
                Err(e) => {
                    warn!("playlist continuation stopped at {}: {:?}", locator, e);
                    return delivered;
                }
            };

            if cancel.is_cancelled() {
                debug!("playlist continuation cancelled after {} of {}", delivered, total);
                return delivered;
            }
            if !deliver(track) {
                debug!("playlist continuation lost its session");
                return delivered;
            }
            delivered += 1;
        }

        info!("playlist continuation finished: {} of {} entries", delivered, total);
        delivered
    }
}

use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::{sync::LazyLock, time::Duration};
use tracing::{debug, info, warn};

use super::{MediaResolver, Track};
use crate::config::Config;

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((?:https?:)//)((?:www|m)\.)?(music\.)?((?:youtube(-nocookie)?\.com|youtu\.be))(/(?:[\w\-]+\?v=|embed/|live/|v/)?)([\w\-]+)(\S+)?$",
    )
    .expect("youtube url pattern is valid")
});

/// Page fragments YouTube serves for media that cannot be played.
const UNAVAILABLE_MARKERS: &[&str] = &[
    r#""playabilityStatus":{"status":"ERROR","reason":"#,
    r#"{"type":"ERROR","text":{"runs":[{"text":"#,
    r#""errorScreen":{"playerErrorMessageRenderer":{"subreason":{"simpleText":"#,
];
const MUSIC_FAVICON: &str = r#"href="https://music.youtube.com/favicon.ico"#;
const MUSIC_AVAILABLE: &str = r#"content="YouTube Music">"#;

/// Subset of `yt-dlp --dump-json` we care about.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    url: Option<String>,
    duration: Option<f64>,
}

/// One line of `yt-dlp --flat-playlist --dump-json`.
#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: Option<String>,
    url: Option<String>,
}

impl FlatEntry {
    fn into_locator(self) -> Option<String> {
        self.url
            .filter(|url| url.starts_with("http"))
            .or_else(|| self.id.map(|id| format!("https://www.youtube.com/watch?v={id}")))
    }
}

/// [`MediaResolver`] backed by the `yt-dlp` binary and a plain HTTP probe.
pub struct YtDlpResolver {
    ytdlp_path: String,
    resolve_timeout: Duration,
    http: reqwest::Client,
}

impl YtDlpResolver {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.probe_timeout_secs))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36")
            .build()
            .context("Error building probe HTTP client")?;

        Ok(Self {
            ytdlp_path: config.ytdlp_path.clone(),
            resolve_timeout: Duration::from_secs(config.resolve_timeout_secs),
            http,
        })
    }

    pub fn is_youtube_url(url: &str) -> bool {
        YOUTUBE_URL.is_match(url)
    }

    /// Decides from a fetched page body whether the media behind it is playable.
    pub fn page_is_available(body: &str) -> bool {
        if UNAVAILABLE_MARKERS.iter().any(|marker| body.contains(marker)) {
            return false;
        }
        !(body.contains(MUSIC_FAVICON) && !body.contains(MUSIC_AVAILABLE))
    }

    /// Checks that the configured yt-dlp binary runs.
    pub async fn verify_dependencies(&self) -> Result<String> {
        let output = Command::new(&self.ytdlp_path)
            .arg("--version")
            .output()
            .await
            .with_context(|| format!("Error running {}", self.ytdlp_path))?;

        if !output.status.success() {
            anyhow::bail!("{} --version exited with {}", self.ytdlp_path, output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run_ytdlp(&self, args: &[&str]) -> Result<String> {
        let mut command = Command::new(&self.ytdlp_path);
        command.args(args).kill_on_drop(true);

        let output = tokio::time::timeout(self.resolve_timeout, command.output())
            .await
            .context("yt-dlp timed out")?
            .context("Error running yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    fn is_recognized_url(&self, url: &str) -> bool {
        Self::is_youtube_url(url)
    }

    async fn probe(&self, url: &str) -> Result<bool> {
        let body = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Error fetching {url}"))?
            .text()
            .await
            .context("Error reading probe response")?;

        let available = Self::page_is_available(&body);
        debug!("probe {} -> available={}", url, available);
        Ok(available)
    }

    async fn resolve(&self, url: &str) -> Result<Track> {
        debug!("resolving {}", url);

        let stdout = self
            .run_ytdlp(&[
                "--no-playlist",
                "--dump-json",
                "--no-warnings",
                "--no-check-certificate",
                "--socket-timeout",
                "10",
                "--format",
                "bestaudio/best",
                url,
            ])
            .await?;

        let info: YtDlpInfo =
            serde_json::from_str(stdout.trim()).context("Error parsing yt-dlp output")?;
        let locator = info
            .url
            .with_context(|| format!("yt-dlp returned no stream url for {url}"))?;

        let mut track = Track::new(info.title, locator);
        if let Some(seconds) = info.duration.filter(|d| d.is_finite() && *d >= 0.0) {
            track = track.with_duration(Duration::from_secs_f64(seconds));
        }

        info!("resolved: {}", track.title());
        Ok(track)
    }

    async fn resolve_listing(&self, url: &str) -> Result<Vec<String>> {
        info!("listing playlist {}", url);

        let stdout = self
            .run_ytdlp(&["--flat-playlist", "--dump-json", "--no-warnings", url])
            .await?;

        let mut entries = Vec::new();
        for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
            match serde_json::from_str::<FlatEntry>(line) {
                Ok(entry) => match entry.into_locator() {
                    Some(locator) => entries.push(locator),
                    None => warn!("playlist entry without url or id skipped"),
                },
                Err(e) => warn!("unparseable playlist entry: {}", e),
            }
        }

        debug!("playlist {} lists {} entries", url, entries.len());
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_url_detection() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&ab_channel=RickAstley",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=jfKfPfyJRdk&ab_channel=LofiGirl",
            "https://www.youtube.com/watch?v=eOii1YaxRK8&list=RDeOii1YaxRK8&start_radio=1",
            "https://www.youtube.com/playlist?list=PLaIpgnL0MSIpQV5mBSMk73V4-1KS5IGpO",
            "https://music.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/RMiOtRFwbAg",
            "https://youtu.be/dQw4w9WgXcQ",
        ] {
            assert!(YtDlpResolver::is_youtube_url(url), "{url} should be recognized");
        }
    }

    #[test]
    fn test_rejects_foreign_and_schemeless_urls() {
        for url in [
            "Test",
            "https://open.spotify.com/track/4NsPgRYUdHu2Q5JRNgXYU5",
            "www.youtube.com/watch?v=dQw4w9WgXcQ&ab_channel=RickAstley",
            "youtube.com/watch?v=dQw4w9WgXcQ&ab_channel=RickAstley",
            "https://example.com/video",
        ] {
            assert!(!YtDlpResolver::is_youtube_url(url), "{url} should be rejected");
        }
    }

    #[test]
    fn test_page_availability_markers() {
        assert!(YtDlpResolver::page_is_available("<html>fine</html>"));
        assert!(!YtDlpResolver::page_is_available(
            r#"..."playabilityStatus":{"status":"ERROR","reason":"Video unavailable"}..."#
        ));
        assert!(!YtDlpResolver::page_is_available(
            r#"<link href="https://music.youtube.com/favicon.ico">"#
        ));
        assert!(YtDlpResolver::page_is_available(
            r#"<link href="https://music.youtube.com/favicon.ico"><meta content="YouTube Music">"#
        ));
    }

    #[test]
    fn test_flat_entry_prefers_url_then_id() {
        let entry: FlatEntry =
            serde_json::from_str(r#"{"id":"abc","url":"https://www.youtube.com/watch?v=abc"}"#).unwrap();
        assert_eq!(entry.into_locator().as_deref(), Some("https://www.youtube.com/watch?v=abc"));

        let entry: FlatEntry = serde_json::from_str(r#"{"id":"xyz","url":"xyz"}"#).unwrap();
        assert_eq!(entry.into_locator().as_deref(), Some("https://www.youtube.com/watch?v=xyz"));

        let entry: FlatEntry = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(entry.into_locator(), None);
    }
}

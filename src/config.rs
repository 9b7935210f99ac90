use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // slash commands registered per guild while developing

    #[serde(default = "default_prefix")]
    pub command_prefix: String,
    #[serde(default = "default_true")]
    pub enable_player_ui: bool,
    #[serde(default = "default_true")]
    pub register_slash_commands: bool,

    // Extraction
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    // Limits
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_user: u32, // commands per window
    #[serde(default = "default_rate_window")]
    pub rate_limit_window_secs: u64,
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_resolve_timeout() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_rate_limit() -> u32 {
    5
}

fn default_rate_window() -> u64 {
    10
}

impl Config {
    /// Loads `.env`, then layers an optional `jukebox.toml` and the process
    /// environment on top of the defaults.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("jukebox").required(false))
            .add_source(config::Environment::default().try_parsing(true));

        Self::from_builder(builder)
    }

    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config: Self = builder
            .build()
            .context("Error reading configuration")?
            .try_deserialize()
            .context("Invalid configuration (is DISCORD_TOKEN set?)")?;

        config.validate()?;
        Ok(config)
    }

    /// Sanity checks that catch typos before the gateway connects.
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if self.command_prefix.trim().is_empty() {
            anyhow::bail!("Command prefix must not be empty");
        }

        if self.resolve_timeout_secs == 0 || self.probe_timeout_secs == 0 {
            anyhow::bail!("Timeouts must be greater than 0");
        }

        if self.rate_limit_per_user == 0 {
            anyhow::bail!("Rate limit must allow at least one command");
        }

        if self.rate_limit_window_secs == 0 {
            anyhow::bail!("Rate limit window must be greater than 0");
        }

        Ok(())
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Token-free summary for the startup log.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: prefix '{}', slash commands {} ({})\n  \
            Player UI: {}\n  \
            yt-dlp: {} ({}s resolve, {}s probe)\n  \
            Limits: {} commands / {}s per user",
            self.command_prefix,
            self.register_slash_commands,
            self.guild_id.map_or("global".to_string(), |id| format!("guild {id}")),
            self.enable_player_ui,
            self.ytdlp_path,
            self.resolve_timeout_secs,
            self.probe_timeout_secs,
            self.rate_limit_per_user,
            self.rate_limit_window_secs
        )
    }
}

/// Default configuration values.
///
/// The token has no default and must be provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            guild_id: None,
            command_prefix: default_prefix(),
            enable_player_ui: true,
            register_slash_commands: true,
            ytdlp_path: default_ytdlp_path(),
            resolve_timeout_secs: default_resolve_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            rate_limit_per_user: default_rate_limit(),
            rate_limit_window_secs: default_rate_window(),
        }
    }
}

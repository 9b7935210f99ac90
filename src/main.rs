use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

use jukebox::{
    audio::SessionRegistry,
    bot::{chat::SerenityChat, JukeboxBot},
    config::Config,
    sources::{TrackResolver, YtDlpResolver},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 starting jukebox v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::load()?);
    let media = Arc::new(YtDlpResolver::new(&config)?);

    if std::env::args().any(|arg| arg == "--health-check") {
        let version = media.verify_dependencies().await?;
        println!("OK (yt-dlp {version})");
        return Ok(());
    }

    info!("{}", config.summary());

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let songbird = Songbird::serenity();
    let http = Arc::new(Http::new(&config.discord_token));
    let chat = Arc::new(SerenityChat::new(http, songbird.clone(), config.enable_player_ui));
    let resolver = Arc::new(TrackResolver::new(media));
    let registry = Arc::new(SessionRegistry::new(chat, resolver));

    let handler = JukeboxBot::new(config.clone(), registry.clone());
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error waiting for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ shutdown signal received, closing...");
        registry.shutdown_all();
        shard_manager.shutdown_all().await;
    });

    info!("🚀 bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

//! # Bot Module
//!
//! Discord front end: turns gateway events into session commands.
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`]. It owns the
//! [`SessionRegistry`], keeps one session per guild in step with guild
//! join/leave events, and answers prefix commands, slash commands and the
//! player buttons on the status message.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, Guild, GuildId, Interaction, Message, Ready, UnavailableGuild, VoiceState},
    async_trait,
    gateway::ActivityData,
};
use std::sync::Arc;
use tracing::{error, info};

pub mod chat;
pub mod commands;
pub mod cooldown;
pub mod handlers;

use crate::{audio::registry::SessionRegistry, config::Config};
use cooldown::Cooldown;

pub struct JukeboxBot {
    config: Arc<Config>,
    registry: Arc<SessionRegistry>,
    cooldown: Cooldown,
}

impl JukeboxBot {
    pub fn new(config: Arc<Config>, registry: Arc<SessionRegistry>) -> Self {
        let cooldown = Cooldown::new(config.rate_limit_per_user, config.rate_limit_window());
        Self {
            config,
            registry,
            cooldown,
        }
    }

    /// Registers slash commands globally, or for `GUILD_ID` only when set
    /// (guild commands propagate immediately).
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ guild commands registered for {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ global commands registered");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 connected to {} guilds", ready.guilds.len());

        ctx.set_activity(Some(ActivityData::listening(format!(
            "music, type {}play",
            self.config.command_prefix
        ))));

        if self.config.register_slash_commands {
            if let Err(e) = self.register_commands(&ctx).await {
                error!("Error registering commands: {:?}", e);
            }
        }

        for guild in &ready.guilds {
            self.registry.create(guild.id);
        }
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, _is_new: Option<bool>) {
        self.registry.create(guild.id);
    }

    async fn guild_delete(&self, _ctx: Context, incomplete: UnavailableGuild, _full: Option<Guild>) {
        // An outage also shows up as a delete; only drop the session when we were removed.
        if !incomplete.unavailable {
            info!("👋 left guild {}", incomplete.id);
            self.registry.remove(incomplete.id);
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if let Some(session) = msg.guild_id.and_then(|guild_id| self.registry.get(guild_id)) {
            session.channel_activity(msg.channel_id, msg.id, &msg.content);
        }
        if msg.author.bot {
            return;
        }
        if let Err(e) = handlers::handle_message(&ctx, &msg, self).await {
            error!("Error handling message: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error handling command: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) = handlers::handle_component(&ctx, component_interaction, self).await {
                    error!("Error handling component: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Reports the bot leaving a voice channel. The session ignores its own leaves.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if new.user_id != ctx.cache.current_user().id {
            return;
        }

        let Some(left) = old.and_then(|state| state.channel_id) else {
            return;
        };
        if new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                info!("🔌 disconnected from voice channel {} in guild {}", left, guild_id);
                if let Some(session) = self.registry.get(guild_id) {
                    session.voice_lost(left);
                }
            }
        }
    }
}

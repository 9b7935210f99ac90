use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{debug, info};

use super::session::{Session, SessionHandle};
use crate::{bot::chat::ChatClient, sources::TrackResolver};

/// One playback session per guild the bot is a member of.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, SessionHandle>,
    chat: Arc<dyn ChatClient>,
    resolver: Arc<TrackResolver>,
}

impl SessionRegistry {
    pub fn new(chat: Arc<dyn ChatClient>, resolver: Arc<TrackResolver>) -> Self {
        Self {
            sessions: DashMap::new(),
            chat,
            resolver,
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions.get(&guild_id).map(|entry| entry.value().clone())
    }

    /// Creates the guild's session. Does nothing if one already exists.
    pub fn create(&self, guild_id: GuildId) {
        self.get_or_create(guild_id);
    }

    /// The guild's session, spawning it first if the bot joined before the
    /// guild was announced.
    pub fn get_or_create(&self, guild_id: GuildId) -> SessionHandle {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                info!("🆕 creating session for guild {}", guild_id);
                Session::spawn(guild_id, self.chat.clone(), self.resolver.clone())
            })
            .value()
            .clone()
    }

    /// Drops the guild's session and shuts it down. No-op for unknown guilds.
    pub fn remove(&self, guild_id: GuildId) {
        match self.sessions.remove(&guild_id) {
            Some((_, handle)) => {
                info!("removing session for guild {}", guild_id);
                handle.shutdown();
            }
            None => debug!("no session to remove for guild {}", guild_id),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Shuts every session down, for process exit.
    pub fn shutdown_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().shutdown();
        }
        self.sessions.clear();
    }
}

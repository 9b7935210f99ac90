use async_trait::async_trait;
use serenity::{
    builder::{CreateMessage, EditMessage},
    http::Http,
    model::id::{ChannelId, GuildId, MessageId},
};
use songbird::Songbird;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    audio::{player::SongbirdSink, sink::AudioSink},
    ui::{buttons, OutgoingMessage},
};

#[derive(Debug, Error)]
pub enum ChatError {
    /// The message (or voice call) no longer exists.
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Outbound side of the chat platform as seen by a playback session.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_message(&self, channel: ChannelId, message: OutgoingMessage) -> Result<MessageId, ChatError>;

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        update: OutgoingMessage,
    ) -> Result<(), ChatError>;

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<(), ChatError>;

    /// Connects to a voice channel and returns the sink that plays into it.
    async fn join_voice(&self, guild: GuildId, channel: ChannelId) -> Result<Box<dyn AudioSink>, ChatError>;

    async fn leave_voice(&self, guild: GuildId) -> Result<(), ChatError>;
}

/// [`ChatClient`] over serenity's REST client and songbird's voice manager.
pub struct SerenityChat {
    http: Arc<Http>,
    songbird: Arc<Songbird>,
    stream_client: reqwest::Client,
    player_ui: bool,
}

impl SerenityChat {
    pub fn new(http: Arc<Http>, songbird: Arc<Songbird>, player_ui: bool) -> Self {
        Self {
            http,
            songbird,
            stream_client: reqwest::Client::new(),
            player_ui,
        }
    }
}

fn classify(error: serenity::Error) -> ChatError {
    if let serenity::Error::Http(http_error) = &error {
        if http_error.status_code().map(|status| status.as_u16()) == Some(404) {
            return ChatError::NotFound;
        }
    }
    ChatError::Other(error.into())
}

#[async_trait]
impl ChatClient for SerenityChat {
    async fn send_message(&self, channel: ChannelId, message: OutgoingMessage) -> Result<MessageId, ChatError> {
        let mut builder = CreateMessage::new().content(message.content);
        if let Some(view) = message.controls.filter(|_| self.player_ui) {
            builder = builder.components(buttons::player_controls(view));
        }

        let sent = channel
            .send_message(self.http.as_ref(), builder)
            .await
            .map_err(classify)?;
        Ok(sent.id)
    }

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        update: OutgoingMessage,
    ) -> Result<(), ChatError> {
        let mut builder = EditMessage::new().content(update.content);
        if let Some(view) = update.controls.filter(|_| self.player_ui) {
            builder = builder.components(buttons::player_controls(view));
        }

        channel
            .edit_message(self.http.as_ref(), message, builder)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<(), ChatError> {
        channel
            .delete_message(&self.http, message)
            .await
            .map_err(classify)
    }

    async fn join_voice(&self, guild: GuildId, channel: ChannelId) -> Result<Box<dyn AudioSink>, ChatError> {
        let call = self
            .songbird
            .join(guild, channel)
            .await
            .map_err(|e| ChatError::Other(anyhow::anyhow!("Error joining voice channel {channel}: {e:?}")))?;

        info!("🔊 connected to voice channel {} in guild {}", channel, guild);
        Ok(Box::new(SongbirdSink::new(call, self.stream_client.clone())))
    }

    async fn leave_voice(&self, guild: GuildId) -> Result<(), ChatError> {
        match self.songbird.remove(guild).await {
            Ok(()) => {
                debug!("disconnected from voice in guild {}", guild);
                Ok(())
            }
            Err(songbird::error::JoinError::NoCall) => Err(ChatError::NotFound),
            Err(e) => Err(ChatError::Other(anyhow::anyhow!("Error leaving voice: {e:?}"))),
        }
    }
}

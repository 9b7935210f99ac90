use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseFollowup, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        channel::Message,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{debug, info, warn};

use super::{cooldown::Cooldown, JukeboxBot};
use crate::{
    audio::session::{PlayRequest, SessionHandle},
    error::Refusal,
    sources::MediaKind,
    ui::{buttons::PlayerButton, split_message, MESSAGE_LIMIT},
};

/// A user command, whichever surface it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Play(String),
    Skip,
    Prev,
    Pause,
    Resume,
    PlayPause,
    Loop,
    Stop,
    Playlist,
    Help,
}

impl BotCommand {
    fn from_name(name: &str, argument: &str) -> Option<Self> {
        let command = match name {
            "play" | "p" => BotCommand::Play(argument.trim().to_string()),
            "skip" | "next" => BotCommand::Skip,
            "prev" | "previous" => BotCommand::Prev,
            "pause" => BotCommand::Pause,
            "resume" => BotCommand::Resume,
            "loop" => BotCommand::Loop,
            "stop" | "leave" => BotCommand::Stop,
            "playlist" | "queue" => BotCommand::Playlist,
            "help" => BotCommand::Help,
            _ => return None,
        };
        Some(command)
    }

    fn from_button(button: PlayerButton) -> Self {
        match button {
            PlayerButton::Previous => BotCommand::Prev,
            PlayerButton::PlayPause => BotCommand::PlayPause,
            PlayerButton::Skip => BotCommand::Skip,
            PlayerButton::Loop => BotCommand::Loop,
            PlayerButton::Stop => BotCommand::Stop,
        }
    }
}

/// `!play <url>` style messages. `None` for anything that is not a command.
pub fn parse_text_command(prefix: &str, content: &str) -> Option<BotCommand> {
    let rest = content.trim().strip_prefix(prefix)?;
    let (name, argument) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    BotCommand::from_name(&name.to_lowercase(), argument)
}

/// Where a command came from, as far as the session cares.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    pub author_voice: Option<ChannelId>,
    pub text_channel: ChannelId,
    pub prefix: &'a str,
}

/// Runs `command` against the guild's session. `Ok` carries the
/// acknowledgement, `Err` the refusal or failure, both ready to show.
pub async fn dispatch(
    session: &SessionHandle,
    command: BotCommand,
    ctx: &CommandContext<'_>,
) -> Result<String, String> {
    let result = match command {
        BotCommand::Help => return Ok(help_text(ctx.prefix)),
        BotCommand::Play(url) => {
            if url.is_empty() {
                return Err(format!("Usage: {}play <youtube url>", ctx.prefix));
            }
            let Some(voice_channel) = ctx.author_voice else {
                return Err(Refusal::AuthorNotInVoice.to_string());
            };
            let request = PlayRequest {
                voice_channel,
                text_channel: ctx.text_channel,
            };
            session.add_to_queue(&url, request).await
        }
        BotCommand::Skip => session.skip().await,
        BotCommand::Prev => session.prev().await,
        BotCommand::Pause => session.pause().await,
        BotCommand::Resume => session.resume().await,
        BotCommand::PlayPause => session.toggle_pause().await,
        BotCommand::Loop => session.toggle_loop().await,
        BotCommand::Stop => session.stop().await,
        BotCommand::Playlist => session.render_queue().await,
    };

    result
        .map(|ack| ack.user_message(ctx.prefix))
        .map_err(|e| e.user_message())
}

pub fn help_text(prefix: &str) -> String {
    format!(
        "**Commands**\n\
        `{p}play <url>` play a YouTube video, short, mix or playlist\n\
        `{p}skip` next song\n\
        `{p}prev` previous song\n\
        `{p}pause` / `{p}resume`\n\
        `{p}loop` toggle looping of the current song\n\
        `{p}stop` clear the playlist and leave\n\
        `{p}playlist` show the playlist\n\
        Every command is also available as a slash command.",
        p = prefix
    )
}

/// The voice channel `user` is connected to in `guild_id`, from the cache.
fn author_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

const PLAYLIST_NOTICE: &str = "Adding playlist, it may take some time";

/// Shown before a playlist is resolved, since that can take a while.
fn playlist_notice(command: &BotCommand) -> Option<&'static str> {
    match command {
        BotCommand::Play(url) if MediaKind::classify(url) == MediaKind::Playlist => Some(PLAYLIST_NOTICE),
        _ => None,
    }
}

fn check_cooldown(cooldown: &Cooldown, user: UserId) -> Result<(), String> {
    cooldown.check(user).map_err(Cooldown::message)
}

/// Prefix commands typed in a guild text channel.
pub async fn handle_message(ctx: &Context, msg: &Message, bot: &JukeboxBot) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let prefix = bot.config.command_prefix.as_str();
    let Some(command) = parse_text_command(prefix, &msg.content) else {
        return Ok(());
    };

    info!("📝 {:?} from {} in guild {}", command, msg.author.name, guild_id);

    let reply = match check_cooldown(&bot.cooldown, msg.author.id) {
        Err(wait) => wait,
        Ok(()) => {
            if let Some(notice) = playlist_notice(&command) {
                msg.channel_id.say(&ctx.http, notice).await?;
            }

            let context = CommandContext {
                author_voice: author_voice_channel(ctx, guild_id, msg.author.id),
                text_channel: msg.channel_id,
                prefix,
            };
            let session = bot.registry.get_or_create(guild_id);
            match dispatch(&session, command, &context).await {
                Ok(reply) | Err(reply) => reply,
            }
        }
    };

    for chunk in split_message(&reply, MESSAGE_LIMIT) {
        msg.channel_id.say(&ctx.http, chunk).await?;
    }
    Ok(())
}

/// Slash commands. Deferred first, since `play` may take a while to resolve.
/// Playlists answer with the notice instead, and the reply follows it.
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("command used outside a guild"))?;

    info!(
        "📝 /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    let argument = command
        .data
        .options
        .iter()
        .find(|option| option.name == "url")
        .and_then(|option| option.value.as_str())
        .unwrap_or_default();
    let Some(parsed) = BotCommand::from_name(&command.data.name, argument) else {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("Unknown command")
                        .ephemeral(true),
                ),
            )
            .await?;
        return Ok(());
    };

    if let Err(wait) = check_cooldown(&bot.cooldown, command.user.id) {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new().content(wait).ephemeral(true),
                ),
            )
            .await?;
        return Ok(());
    }

    let notice = playlist_notice(&parsed);
    let initial = match notice {
        Some(notice) => CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().content(notice)),
        None => CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
    };
    command.create_response(&ctx.http, initial).await?;

    let context = CommandContext {
        author_voice: author_voice_channel(ctx, guild_id, command.user.id),
        text_channel: command.channel_id,
        prefix: bot.config.command_prefix.as_str(),
    };
    let session = bot.registry.get_or_create(guild_id);
    let reply = match dispatch(&session, parsed, &context).await {
        Ok(reply) | Err(reply) => reply,
    };

    let mut chunks = split_message(&reply, MESSAGE_LIMIT).into_iter();
    if notice.is_none() {
        let first = chunks.next().unwrap_or_default();
        command
            .edit_response(&ctx.http, EditInteractionResponse::new().content(first))
            .await?;
    }
    for chunk in chunks {
        command
            .create_followup(&ctx.http, CreateInteractionResponseFollowup::new().content(chunk))
            .await?;
    }
    Ok(())
}

/// Player buttons on the status message. Successes show up in the status
/// message itself; only failures get a (private) reply.
pub async fn handle_component(ctx: &Context, component: ComponentInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("button used outside a guild"))?;

    let Some(button) = PlayerButton::from_custom_id(&component.data.custom_id) else {
        debug!("ignoring unknown component {}", component.data.custom_id);
        return Ok(());
    };

    info!(
        "🔘 {:?} pressed by {} in guild {}",
        button, component.user.name, guild_id
    );

    component
        .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
        .await?;

    let outcome = match check_cooldown(&bot.cooldown, component.user.id) {
        Err(wait) => Err(wait),
        Ok(()) => {
            let context = CommandContext {
                author_voice: author_voice_channel(ctx, guild_id, component.user.id),
                text_channel: component.channel_id,
                prefix: bot.config.command_prefix.as_str(),
            };
            let session = bot.registry.get_or_create(guild_id);
            dispatch(&session, BotCommand::from_button(button), &context).await
        }
    };

    if let Err(reply) = outcome {
        if let Err(e) = component
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new().content(reply).ephemeral(true),
            )
            .await
        {
            warn!("Error replying to button press: {:?}", e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::session::Session,
        sources::TrackResolver,
        testing::{video_url, FakeChat, ScriptedMedia},
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_parse_text_commands() {
        assert_eq!(
            parse_text_command("!", "!play https://youtu.be/abc"),
            Some(BotCommand::Play("https://youtu.be/abc".into()))
        );
        assert_eq!(parse_text_command("!", "!SKIP"), Some(BotCommand::Skip));
        assert_eq!(parse_text_command("!", "  !loop  "), Some(BotCommand::Loop));
        assert_eq!(parse_text_command("!", "!play"), Some(BotCommand::Play(String::new())));
        assert_eq!(parse_text_command("?", "?playlist"), Some(BotCommand::Playlist));
    }

    #[test]
    fn test_parse_ignores_other_messages() {
        assert_eq!(parse_text_command("!", "play something"), None);
        assert_eq!(parse_text_command("!", "!shuffle"), None);
        assert_eq!(parse_text_command("!", "! play x"), None);
        assert_eq!(parse_text_command("!", ""), None);
    }

    #[test]
    fn test_playlist_notice_only_for_playlists() {
        let playlist = BotCommand::Play("https://www.youtube.com/playlist?list=PLabc".into());
        assert_eq!(playlist_notice(&playlist), Some(PLAYLIST_NOTICE));
        assert_eq!(playlist_notice(&BotCommand::Play(video_url('a'))), None);
        assert_eq!(playlist_notice(&BotCommand::Skip), None);
    }

    #[test]
    fn test_buttons_map_to_commands() {
        assert_eq!(BotCommand::from_button(PlayerButton::PlayPause), BotCommand::PlayPause);
        assert_eq!(BotCommand::from_button(PlayerButton::Previous), BotCommand::Prev);
    }

    fn session() -> SessionHandle {
        let media = ScriptedMedia::new().with_track(&video_url('a'), "A", "stream://a");
        let resolver = Arc::new(TrackResolver::new(Arc::new(media)));
        Session::spawn(GuildId::new(1), FakeChat::new(), resolver)
    }

    fn context(author_voice: Option<ChannelId>) -> CommandContext<'static> {
        CommandContext {
            author_voice,
            text_channel: ChannelId::new(20),
            prefix: "!",
        }
    }

    #[tokio::test]
    async fn test_play_requires_author_in_voice() {
        let session = session();

        let reply = dispatch(&session, BotCommand::Play(video_url('a')), &context(None)).await;

        assert_eq!(reply, Err("You must be in a voice channel to play music.".to_string()));
        assert!(session.snapshot().await.unwrap().titles.is_empty());
    }

    #[tokio::test]
    async fn test_play_without_url_shows_usage() {
        let session = session();
        let reply = dispatch(&session, BotCommand::Play(String::new()), &context(Some(ChannelId::new(10)))).await;
        assert_eq!(reply, Err("Usage: !play <youtube url>".to_string()));
    }

    #[tokio::test]
    async fn test_dispatch_replies_for_each_outcome() {
        let session = session();
        let ctx = context(Some(ChannelId::new(10)));

        assert_eq!(
            dispatch(&session, BotCommand::Play(video_url('a')), &ctx).await,
            Ok("Playing A".to_string())
        );
        assert_eq!(
            dispatch(&session, BotCommand::Skip, &ctx).await,
            Err("No next song.".to_string())
        );
        assert_eq!(
            dispatch(&session, BotCommand::Playlist, &ctx).await,
            Ok("\tPlaylist:\nA\n".to_string())
        );
        assert_eq!(
            dispatch(&session, BotCommand::Play("https://example.com".into()), &ctx).await,
            Err("Invalid URL".to_string())
        );
        assert_eq!(
            dispatch(&session, BotCommand::Stop, &ctx).await,
            Ok("My job here is done!".to_string())
        );
    }

    #[test]
    fn test_help_uses_prefix() {
        let help = help_text("?");
        assert!(help.contains("`?play <url>`"));
        assert!(!help.contains("`!"));
    }
}

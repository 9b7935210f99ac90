use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::Command, application::CommandOptionType, id::GuildId},
    prelude::Context,
};

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        skip_command(),
        prev_command(),
        pause_command(),
        resume_command(),
        loop_command(),
        stop_command(),
        playlist_command(),
        help_command(),
    ]
}

/// Registers every slash command globally.
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    Command::set_global_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

/// Registers every slash command for one guild (development).
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

// Playback

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play a YouTube video, short, mix or playlist")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "url", "YouTube URL").required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip to the next song")
}

fn prev_command() -> CreateCommand {
    CreateCommand::new("prev").description("Go back to the previous song")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pause playback")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resume playback")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop").description("Toggle looping of the current song")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop, clear the playlist and leave the voice channel")
}

// Info

fn playlist_command() -> CreateCommand {
    CreateCommand::new("playlist").description("Show the current playlist")
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("List the available commands")
}

use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::{fmt, sync::Arc};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    queue::{QueueId, TrackQueue},
    sink::{AudioSink, FinishNotifier},
};
use crate::{
    bot::chat::{ChatClient, ChatError},
    error::{Refusal, SessionError},
    sources::{Outcome, PendingEntries, Track, TrackResolver},
    ui::{OutgoingMessage, PlayerView},
};

pub const FAREWELL: &str = "My job here is done!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Connecting,
    Playing,
    Paused,
}

/// Where a `play` came from: the requester's voice channel and the text
/// channel the status message goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayRequest {
    pub voice_channel: ChannelId,
    pub text_channel: ChannelId,
}

/// Successful result of a session command.
#[derive(Debug, Clone, PartialEq)]
pub enum Ack {
    Started(Track),
    Queued(Track),
    PlaylistStarted { first: Track, pending: usize },
    PlaylistQueued { first: Track, pending: usize },
    Skipped(Track),
    Rewound(Track),
    Paused,
    Resumed,
    Looping(bool),
    Stopped,
    Listing(String),
}

impl Ack {
    pub fn user_message(&self, prefix: &str) -> String {
        match self {
            Ack::Started(track) => format!("Playing {}", track.title()),
            Ack::Queued(track) => format!("Added {} to the playlist", track.title()),
            Ack::PlaylistStarted { first, pending } | Ack::PlaylistQueued { first, pending } => {
                format!("Added {} and {} more songs to the playlist", first.title(), pending)
            }
            Ack::Skipped(track) => format!("Skipped to {}", track.title()),
            Ack::Rewound(track) => format!("Back to {}", track.title()),
            Ack::Paused => "Paused.".to_string(),
            Ack::Resumed => "Resumed.".to_string(),
            Ack::Looping(true) => {
                format!("Music is now looping. To disable loop mode, send '{prefix}loop'")
            }
            Ack::Looping(false) => "Music is no longer looping.".to_string(),
            Ack::Stopped => FAREWELL.to_string(),
            Ack::Listing(listing) => listing.clone(),
        }
    }
}

/// Point-in-time view of a session, for commands and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    pub queue_id: QueueId,
    pub titles: Vec<String>,
    pub current: Option<Track>,
    pub is_looping: bool,
    pub voice_channel: Option<ChannelId>,
}

type Reply = oneshot::Sender<Result<Ack, SessionError>>;

/// Everything a session reacts to, in arrival order.
#[derive(Debug)]
pub enum SessionCommand {
    Enqueue {
        request: PlayRequest,
        outcome: Outcome,
        reply: Reply,
    },
    /// A track fetched by a playlist continuation for queue `queue_id`.
    Append { queue_id: QueueId, track: Track },
    Skip { reply: Reply },
    Prev { reply: Reply },
    Pause { reply: Reply },
    Resume { reply: Reply },
    TogglePause { reply: Reply },
    ToggleLoop { reply: Reply },
    Stop { reply: Reply },
    Render { reply: Reply },
    Snapshot { reply: oneshot::Sender<SessionSnapshot> },
    /// The stream started under `generation` ended or failed.
    TrackFinished { generation: u64 },
    /// The bot was disconnected from voice `channel`.
    VoiceLost { channel: ChannelId },
    /// A message was posted in a guild text channel.
    ChannelActivity {
        channel: ChannelId,
        message: MessageId,
        content: String,
    },
    Shutdown,
}

/// The persistent "now playing" message.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StatusMessage {
    channel: ChannelId,
    id: MessageId,
    content: String,
}

/// Playback state machine for one guild.
///
/// Owned by a single task; every mutation arrives through its command
/// channel, so commands, stream completions and playlist continuations
/// never interleave.
pub struct Session {
    guild_id: GuildId,
    chat: Arc<dyn ChatClient>,
    resolver: Arc<TrackResolver>,
    commands: mpsc::UnboundedSender<SessionCommand>,
    queue: TrackQueue,
    sink: Option<Box<dyn AudioSink>>,
    state: PlaybackState,
    is_looping: bool,
    /// Bumped on every stream start and teardown. Completion events carrying
    /// an older value are ignored.
    generation: u64,
    status: Option<StatusMessage>,
    text_channel: Option<ChannelId>,
    voice_channel: Option<ChannelId>,
    background: CancellationToken,
}

impl Session {
    /// Starts the session task and returns the handle that talks to it.
    pub fn spawn(guild_id: GuildId, chat: Arc<dyn ChatClient>, resolver: Arc<TrackResolver>) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session {
            guild_id,
            chat,
            resolver: resolver.clone(),
            commands: tx.clone(),
            queue: TrackQueue::new(),
            sink: None,
            state: PlaybackState::Idle,
            is_looping: false,
            generation: 0,
            status: None,
            text_channel: None,
            voice_channel: None,
            background: CancellationToken::new(),
        };
        tokio::spawn(session.run(rx));

        SessionHandle {
            guild_id,
            commands: tx,
            resolver,
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionCommand>) {
        info!("🎵 session started for guild {}", self.guild_id);

        while let Some(command) = rx.recv().await {
            if !self.handle(command).await {
                break;
            }
        }

        self.background.cancel();
        info!("session closed for guild {}", self.guild_id);
    }

    /// Returns `false` once the session should stop.
    async fn handle(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Enqueue {
                request,
                outcome,
                reply,
            } => {
                let result = self.enqueue(request, outcome).await;
                respond(reply, result);
            }
            SessionCommand::Append { queue_id, track } => self.append_fetched(queue_id, track),
            SessionCommand::Skip { reply } => {
                let result = self.skip().await;
                respond(reply, result);
            }
            SessionCommand::Prev { reply } => {
                let result = self.prev().await;
                respond(reply, result);
            }
            SessionCommand::Pause { reply } => {
                let result = self.pause().await;
                respond(reply, result);
            }
            SessionCommand::Resume { reply } => {
                let result = self.resume().await;
                respond(reply, result);
            }
            SessionCommand::TogglePause { reply } => {
                let result = if self.state == PlaybackState::Paused {
                    self.resume().await
                } else {
                    self.pause().await
                };
                respond(reply, result);
            }
            SessionCommand::ToggleLoop { reply } => {
                let result = self.toggle_loop().await;
                respond(reply, result);
            }
            SessionCommand::Stop { reply } => {
                let result = self.stop().await;
                respond(reply, result);
            }
            SessionCommand::Render { reply } => {
                let result = self.render();
                respond(reply, result);
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            SessionCommand::TrackFinished { generation } => self.on_track_finished(generation).await,
            SessionCommand::VoiceLost { channel } => {
                // Our own leave also reports a disconnect; only the connected channel counts.
                if self.voice_channel == Some(channel) {
                    info!("voice connection lost in guild {}", self.guild_id);
                    self.teardown(false).await;
                } else {
                    debug!("ignoring disconnect from voice channel {}", channel);
                }
            }
            SessionCommand::ChannelActivity {
                channel,
                message,
                content,
            } => self.repost_status(channel, message, &content).await,
            SessionCommand::Shutdown => {
                self.teardown(false).await;
                return false;
            }
        }
        true
    }

    async fn enqueue(&mut self, request: PlayRequest, outcome: Outcome) -> Result<Ack, SessionError> {
        let (first, remainder) = match outcome {
            Outcome::Single(track) => (track, None),
            Outcome::Playlist { first, remainder } => (first, Some(remainder)),
            Outcome::Invalid => return Err(SessionError::InvalidInput("unrecognized media".into())),
            Outcome::Failed => return Err(SessionError::ResolutionFailed),
        };

        if self.state == PlaybackState::Idle {
            return self.start_session(request, first, remainder).await;
        }

        if self.voice_channel != Some(request.voice_channel) {
            return Err(Refusal::OtherChannel.into());
        }

        self.queue.append(first.clone());
        self.refresh_status().await;
        Ok(match remainder {
            Some(rest) => {
                let pending = rest.len();
                self.fetch_remainder(rest);
                Ack::PlaylistQueued { first, pending }
            }
            None => Ack::Queued(first),
        })
    }

    async fn start_session(
        &mut self,
        request: PlayRequest,
        first: Track,
        remainder: Option<PendingEntries>,
    ) -> Result<Ack, SessionError> {
        self.state = PlaybackState::Connecting;
        debug!(
            "joining voice channel {} in guild {}",
            request.voice_channel, self.guild_id
        );

        let sink = match self.chat.join_voice(self.guild_id, request.voice_channel).await {
            Ok(sink) => sink,
            Err(e) => {
                error!("Error joining voice channel {}: {:?}", request.voice_channel, e);
                self.state = PlaybackState::Idle;
                return Err(SessionError::DeviceFault(e.to_string()));
            }
        };
        self.sink = Some(sink);
        self.voice_channel = Some(request.voice_channel);
        self.text_channel = Some(request.text_channel);

        self.queue.append(first.clone());
        self.state = PlaybackState::Playing;
        if let Err(e) = self.start_current().await {
            self.teardown(false).await;
            return Err(e);
        }

        Ok(match remainder {
            Some(rest) => {
                let pending = rest.len();
                self.fetch_remainder(rest);
                Ack::PlaylistStarted { first, pending }
            }
            None => Ack::Started(first),
        })
    }

    /// Resolves the rest of a playlist off the command loop. Each track comes
    /// back as [`SessionCommand::Append`] tagged with the current queue.
    fn fetch_remainder(&self, pending: PendingEntries) {
        if pending.is_empty() {
            return;
        }

        let cancel = self.background.child_token();
        let commands = self.commands.clone();
        let resolver = self.resolver.clone();
        let queue_id = self.queue.id();
        let guild_id = self.guild_id;

        tokio::spawn(async move {
            let delivered = resolver
                .resolve_remainder(pending, cancel, |track| {
                    commands.send(SessionCommand::Append { queue_id, track }).is_ok()
                })
                .await;
            debug!(
                "background playlist fetch for guild {} delivered {} tracks",
                guild_id, delivered
            );
        });
    }

    fn append_fetched(&mut self, queue_id: QueueId, track: Track) {
        if queue_id != self.queue.id() {
            debug!("dropping {} fetched for a discarded playlist", track.title());
            return;
        }
        self.queue.append(track);
    }

    /// Starts the sink on the track under the cursor and publishes it.
    async fn start_current(&mut self) -> Result<Track, SessionError> {
        let track = self.queue.current_track().ok_or(Refusal::EmptyQueue)?;
        let sink = self.sink.as_mut().ok_or(Refusal::NotInVoice)?;

        self.generation += 1;
        let notifier = FinishNotifier::new(self.commands.clone(), self.generation);
        if let Err(e) = sink.start(track.locator(), notifier).await {
            error!("Error starting stream for {}: {:?}", track.title(), e);
            return Err(SessionError::DeviceFault(e.to_string()));
        }

        info!("▶️ now playing {} in guild {}", track.title(), self.guild_id);
        self.publish_status(&track).await;
        Ok(track)
    }

    /// Releases the current stream and starts the one under the cursor.
    async fn switch_stream(&mut self) -> Result<Track, SessionError> {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.pause().await {
                debug!("nothing to pause before switching: {:?}", e);
            }
            sink.stop().await;
        }
        self.state = PlaybackState::Playing;
        self.start_current().await
    }

    async fn on_track_finished(&mut self, generation: u64) {
        let active = matches!(self.state, PlaybackState::Playing | PlaybackState::Paused);
        if generation != self.generation || !active {
            debug!(
                "ignoring completion of stream {} (current {})",
                generation, self.generation
            );
            return;
        }

        debug!("changing song, looping: {}", self.is_looping);
        if !self.is_looping && self.queue.advance().is_none() {
            info!("playlist finished in guild {}", self.guild_id);
            self.teardown(true).await;
            return;
        }

        // Unplayable tracks are passed over until one starts or the queue runs out.
        loop {
            let Err(e) = self.switch_stream().await else {
                return;
            };
            warn!("Error playing next song in guild {}: {}", self.guild_id, e);
            if let Some(track) = self.queue.current_track() {
                self.notify(&format!("Couldn't play {}, skipping it.", track.title()))
                    .await;
            }
            if self.is_looping || self.queue.advance().is_none() {
                self.teardown(true).await;
                return;
            }
        }
    }

    async fn skip(&mut self) -> Result<Ack, SessionError> {
        self.ensure_active()?;
        if self.is_looping {
            return Err(Refusal::SkipWhileLooping.into());
        }
        if self.queue.advance().is_none() {
            return Err(Refusal::NoNext.into());
        }
        let previous = self.state;
        match self.switch_stream().await {
            Ok(track) => Ok(Ack::Skipped(track)),
            Err(e) => {
                self.queue.retreat();
                self.recover_stream(previous).await;
                Err(e)
            }
        }
    }

    async fn prev(&mut self) -> Result<Ack, SessionError> {
        self.ensure_active()?;
        if self.is_looping {
            return Err(Refusal::PrevWhileLooping.into());
        }
        if self.queue.retreat().is_none() {
            return Err(Refusal::NoPrevious.into());
        }
        let previous = self.state;
        match self.switch_stream().await {
            Ok(track) => Ok(Ack::Rewound(track)),
            Err(e) => {
                self.queue.advance();
                self.recover_stream(previous).await;
                Err(e)
            }
        }
    }

    /// Restarts the track under the cursor after a failed switch, leaving
    /// voice when that fails too.
    async fn recover_stream(&mut self, previous: PlaybackState) {
        warn!("switch failed in guild {}, restarting the current track", self.guild_id);
        if let Err(e) = self.start_current().await {
            error!("Error restarting stream in guild {}: {}", self.guild_id, e);
            self.notify("The audio stream stopped working, leaving the voice channel.")
                .await;
            self.teardown(false).await;
            return;
        }

        if previous == PlaybackState::Paused {
            if let Some(sink) = self.sink.as_mut() {
                if let Err(e) = sink.pause().await {
                    warn!("Error pausing restarted stream: {:?}", e);
                    return;
                }
            }
            self.state = PlaybackState::Paused;
            self.refresh_status().await;
        }
    }

    async fn pause(&mut self) -> Result<Ack, SessionError> {
        let sink = self.sink.as_mut().ok_or(Refusal::NotPlaying)?;
        if !sink.is_playing().await {
            return Err(Refusal::NotPlaying.into());
        }
        sink.pause()
            .await
            .map_err(|e| SessionError::DeviceFault(e.to_string()))?;

        self.state = PlaybackState::Paused;
        self.refresh_status().await;
        Ok(Ack::Paused)
    }

    async fn resume(&mut self) -> Result<Ack, SessionError> {
        let sink = self.sink.as_mut().ok_or(Refusal::NotPaused)?;
        if !sink.is_paused().await {
            return Err(Refusal::NotPaused.into());
        }
        sink.resume()
            .await
            .map_err(|e| SessionError::DeviceFault(e.to_string()))?;

        self.state = PlaybackState::Playing;
        self.refresh_status().await;
        Ok(Ack::Resumed)
    }

    async fn toggle_loop(&mut self) -> Result<Ack, SessionError> {
        self.is_looping = !self.is_looping;
        info!("looping {} in guild {}", self.is_looping, self.guild_id);
        self.refresh_status().await;
        Ok(Ack::Looping(self.is_looping))
    }

    async fn stop(&mut self) -> Result<Ack, SessionError> {
        if self.state == PlaybackState::Idle {
            return Err(Refusal::NotConnected.into());
        }
        self.teardown(false).await;
        Ok(Ack::Stopped)
    }

    fn render(&self) -> Result<Ack, SessionError> {
        if self.queue.is_empty() {
            return Err(Refusal::EmptyQueue.into());
        }
        Ok(Ack::Listing(self.queue.render()))
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            queue_id: self.queue.id(),
            titles: self.queue.iter().map(|track| track.title().to_string()).collect(),
            current: self.queue.current_track(),
            is_looping: self.is_looping,
            voice_channel: self.voice_channel,
        }
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match self.state {
            PlaybackState::Playing | PlaybackState::Paused => Ok(()),
            PlaybackState::Idle | PlaybackState::Connecting => Err(Refusal::NotInVoice.into()),
        }
    }

    fn view(&self) -> PlayerView {
        PlayerView {
            paused: self.state == PlaybackState::Paused,
            looping: self.is_looping,
        }
    }

    /// Edits the status message in place, or posts a new one when there is
    /// none or it was deleted.
    async fn publish_status(&mut self, track: &Track) {
        let position = self.queue.position().map(|index| (index, self.queue.len()));
        let message = OutgoingMessage::now_playing(track, position, self.view());

        if let Some((channel, id)) = self.status.as_ref().map(|status| (status.channel, status.id)) {
            match self.chat.edit_message(channel, id, message.clone()).await {
                Ok(()) => {
                    if let Some(status) = self.status.as_mut() {
                        status.content = message.content;
                    }
                    return;
                }
                Err(ChatError::NotFound) => {
                    warn!("status message is gone, posting a new one");
                    self.status = None;
                }
                Err(e) => {
                    warn!("Error editing status message: {:?}", e);
                    return;
                }
            }
        }

        let Some(channel) = self.text_channel else {
            return;
        };
        let content = message.content.clone();
        match self.chat.send_message(channel, message).await {
            Ok(id) => self.status = Some(StatusMessage { channel, id, content }),
            Err(e) => warn!("Error sending status message: {:?}", e),
        }
    }

    /// Moves the status message below a newer message in its channel.
    async fn repost_status(&mut self, channel: ChannelId, message: MessageId, content: &str) {
        let Some(status) = self.status.as_ref() else {
            return;
        };
        if status.channel != channel || status.id == message || status.content == content {
            return;
        }
        let Some(track) = self.queue.current_track() else {
            return;
        };

        if let Some(status) = self.status.take() {
            self.delete_status(status).await;
        }
        debug!("reposting status message in guild {}", self.guild_id);
        self.publish_status(&track).await;
    }

    async fn delete_status(&self, status: StatusMessage) {
        match self.chat.delete_message(status.channel, status.id).await {
            Ok(()) => {}
            Err(ChatError::NotFound) => warn!("Failed to delete message, message not found"),
            Err(e) => warn!("Error deleting status message: {:?}", e),
        }
    }

    async fn refresh_status(&mut self) {
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            return;
        }
        if let Some(track) = self.queue.current_track() {
            self.publish_status(&track).await;
        }
    }

    async fn notify(&self, content: &str) {
        let Some(channel) = self.text_channel else {
            return;
        };
        if let Err(e) = self.chat.send_message(channel, OutgoingMessage::text(content)).await {
            warn!("Error sending message: {:?}", e);
        }
    }

    /// Back to `Idle` with an empty queue. Cancels any playlist continuation,
    /// releases the sink, leaves voice and removes the status message.
    async fn teardown(&mut self, farewell: bool) {
        self.background.cancel();
        self.background = CancellationToken::new();

        if let Some(mut sink) = self.sink.take() {
            sink.stop().await;
        }

        if self.voice_channel.take().is_some() {
            match self.chat.leave_voice(self.guild_id).await {
                Ok(()) => {}
                Err(ChatError::NotFound) => debug!("voice call already gone"),
                Err(e) => warn!("Error leaving voice channel: {:?}", e),
            }
        }

        if let Some(status) = self.status.take() {
            self.delete_status(status).await;
        }

        if farewell {
            self.notify(FAREWELL).await;
        }

        self.text_channel = None;
        self.queue = TrackQueue::new();
        self.is_looping = false;
        self.state = PlaybackState::Idle;
        self.generation += 1;
        info!("session reset for guild {}", self.guild_id);
    }
}

fn respond(reply: Reply, result: Result<Ack, SessionError>) {
    match &result {
        Err(e) if e.is_refusal() => debug!("refused: {}", e),
        Err(e) => warn!("command failed: {}", e),
        Ok(_) => {}
    }
    let _ = reply.send(result);
}

/// Cloneable front door to a running [`Session`].
#[derive(Clone)]
pub struct SessionHandle {
    guild_id: GuildId,
    commands: mpsc::UnboundedSender<SessionCommand>,
    resolver: Arc<TrackResolver>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("guild_id", &self.guild_id)
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

impl SessionHandle {
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Resolves `url` in the caller's task, then hands the result to the
    /// session. Only the first entry of a playlist is resolved before this
    /// returns.
    pub async fn add_to_queue(&self, url: &str, request: PlayRequest) -> Result<Ack, SessionError> {
        match self.resolver.resolve(url).await {
            Outcome::Invalid => Err(SessionError::InvalidInput(url.to_string())),
            Outcome::Failed => Err(SessionError::ResolutionFailed),
            outcome => {
                self.request(|reply| SessionCommand::Enqueue {
                    request,
                    outcome,
                    reply,
                })
                .await
            }
        }
    }

    pub async fn skip(&self) -> Result<Ack, SessionError> {
        self.request(|reply| SessionCommand::Skip { reply }).await
    }

    pub async fn prev(&self) -> Result<Ack, SessionError> {
        self.request(|reply| SessionCommand::Prev { reply }).await
    }

    pub async fn pause(&self) -> Result<Ack, SessionError> {
        self.request(|reply| SessionCommand::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<Ack, SessionError> {
        self.request(|reply| SessionCommand::Resume { reply }).await
    }

    pub async fn toggle_pause(&self) -> Result<Ack, SessionError> {
        self.request(|reply| SessionCommand::TogglePause { reply }).await
    }

    pub async fn toggle_loop(&self) -> Result<Ack, SessionError> {
        self.request(|reply| SessionCommand::ToggleLoop { reply }).await
    }

    pub async fn stop(&self) -> Result<Ack, SessionError> {
        self.request(|reply| SessionCommand::Stop { reply }).await
    }

    pub async fn render_queue(&self) -> Result<Ack, SessionError> {
        self.request(|reply| SessionCommand::Render { reply }).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Snapshot { reply })
            .map_err(|_| SessionError::SessionClosed)?;
        rx.await.map_err(|_| SessionError::SessionClosed)
    }

    /// The bot left voice `channel`. Ignored unless the session is connected there.
    pub fn voice_lost(&self, channel: ChannelId) {
        let _ = self.commands.send(SessionCommand::VoiceLost { channel });
    }

    /// Reports a message posted in the guild, so the status message can stay last.
    pub fn channel_activity(&self, channel: ChannelId, message: MessageId, content: &str) {
        let _ = self.commands.send(SessionCommand::ChannelActivity {
            channel,
            message,
            content: content.to_string(),
        });
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
    }

    async fn request<F>(&self, build: F) -> Result<Ack, SessionError>
    where
        F: FnOnce(Reply) -> SessionCommand,
    {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| SessionError::SessionClosed)?;
        rx.await.map_err(|_| SessionError::SessionClosed)?
    }

    #[cfg(test)]
    pub(crate) fn send_raw(&self, command: SessionCommand) {
        let _ = self.commands.send(command);
    }
}

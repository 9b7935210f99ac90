//! Recording fakes for the chat, audio and extraction seams.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Notify;

use crate::{
    audio::sink::{AudioSink, FinishNotifier},
    bot::chat::{ChatClient, ChatError},
    sources::{MediaResolver, Track},
    ui::OutgoingMessage,
};

/// `https://www.youtube.com/watch?v=` plus an 11 character id made of `c`.
pub fn video_url(c: char) -> String {
    format!("https://www.youtube.com/watch?v={}", c.to_string().repeat(11))
}

/// Polls `check` until it holds, panicking after about two seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[derive(Debug, Default)]
pub struct SinkLog {
    pub started: Vec<String>,
    pub playing: bool,
    pub paused: bool,
    pub pauses: usize,
    pub stops: usize,
    /// Number of upcoming `start` calls that fail.
    pub fail_next_starts: usize,
    pub notifier: Option<FinishNotifier>,
}

pub struct FakeSink {
    log: Arc<Mutex<SinkLog>>,
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn start(&mut self, locator: &str, on_finished: FinishNotifier) -> Result<()> {
        let mut log = self.log.lock();
        if log.fail_next_starts > 0 {
            log.fail_next_starts -= 1;
            bail!("decoder refused {locator}");
        }
        log.started.push(locator.to_string());
        log.playing = true;
        log.paused = false;
        log.notifier = Some(on_finished);
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        let mut log = self.log.lock();
        log.pauses += 1;
        if log.playing {
            log.playing = false;
            log.paused = true;
        }
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        let mut log = self.log.lock();
        log.playing = true;
        log.paused = false;
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        self.log.lock().playing
    }

    async fn is_paused(&self) -> bool {
        self.log.lock().paused
    }

    async fn stop(&mut self) {
        let mut log = self.log.lock();
        log.stops += 1;
        log.playing = false;
        log.paused = false;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Sent { channel: ChannelId, content: String },
    Edited { message: MessageId, content: String },
    Deleted { message: MessageId },
    Joined { guild: GuildId, channel: ChannelId },
    Left { guild: GuildId },
}

/// [`ChatClient`] that records every call. Sinks it hands out share one log.
#[derive(Default)]
pub struct FakeChat {
    events: Mutex<Vec<ChatEvent>>,
    sink: Arc<Mutex<SinkLog>>,
    last_message: AtomicU64,
    fail_join: AtomicBool,
    status_gone: AtomicBool,
}

impl FakeChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().clone()
    }

    pub fn sink(&self) -> MutexGuard<'_, SinkLog> {
        self.sink.lock()
    }

    pub fn set_fail_join(&self, fail: bool) {
        self.fail_join.store(fail, Ordering::SeqCst);
    }

    /// Makes edits and deletes fail as if the message had been removed.
    pub fn set_status_gone(&self, gone: bool) {
        self.status_gone.store(gone, Ordering::SeqCst);
    }

    /// Fires the completion of the most recently started stream.
    pub fn finish_current(&self) {
        let notifier = self.sink.lock().notifier.clone();
        notifier.expect("no stream started").notify();
    }

    fn record(&self, event: ChatEvent) {
        self.events.lock().push(event);
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn send_message(&self, channel: ChannelId, message: OutgoingMessage) -> Result<MessageId, ChatError> {
        self.record(ChatEvent::Sent {
            channel,
            content: message.content,
        });
        let id = self.last_message.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MessageId::new(id))
    }

    async fn edit_message(
        &self,
        _channel: ChannelId,
        message: MessageId,
        update: OutgoingMessage,
    ) -> Result<(), ChatError> {
        if self.status_gone.load(Ordering::SeqCst) {
            return Err(ChatError::NotFound);
        }
        self.record(ChatEvent::Edited {
            message,
            content: update.content,
        });
        Ok(())
    }

    async fn delete_message(&self, _channel: ChannelId, message: MessageId) -> Result<(), ChatError> {
        if self.status_gone.load(Ordering::SeqCst) {
            return Err(ChatError::NotFound);
        }
        self.record(ChatEvent::Deleted { message });
        Ok(())
    }

    async fn join_voice(&self, guild: GuildId, channel: ChannelId) -> Result<Box<dyn AudioSink>, ChatError> {
        if self.fail_join.load(Ordering::SeqCst) {
            return Err(ChatError::Other(anyhow!("voice gateway timed out")));
        }
        self.record(ChatEvent::Joined { guild, channel });
        Ok(Box::new(FakeSink {
            log: self.sink.clone(),
        }))
    }

    async fn leave_voice(&self, guild: GuildId) -> Result<(), ChatError> {
        self.record(ChatEvent::Left { guild });
        Ok(())
    }
}

/// [`MediaResolver`] answering from fixed tables.
///
/// Any `youtube.com` URL is recognized and available. A gated locator blocks
/// in `resolve` until its [`Notify`] is signalled.
#[derive(Default)]
pub struct ScriptedMedia {
    tracks: HashMap<String, Track>,
    listings: HashMap<String, Vec<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    resolved: Mutex<Vec<String>>,
}

impl ScriptedMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, url: &str, title: &str, locator: &str) -> Self {
        self.tracks.insert(url.to_string(), Track::new(title, locator));
        self
    }

    pub fn with_listing(mut self, url: &str, entries: Vec<&str>) -> Self {
        self.listings
            .insert(url.to_string(), entries.into_iter().map(String::from).collect());
        self
    }

    pub fn gate(&self, locator: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(locator.to_string(), gate.clone());
        gate
    }

    /// Every locator `resolve` finished with, in order.
    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().clone()
    }
}

#[async_trait]
impl MediaResolver for ScriptedMedia {
    fn is_recognized_url(&self, url: &str) -> bool {
        url.contains("youtube.com")
    }

    async fn probe(&self, _url: &str) -> Result<bool> {
        Ok(true)
    }

    async fn resolve(&self, url: &str) -> Result<Track> {
        let gate = self.gates.lock().get(url).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.resolved.lock().push(url.to_string());
        self.tracks.get(url).cloned().ok_or_else(|| anyhow!("no media at {url}"))
    }

    async fn resolve_listing(&self, url: &str) -> Result<Vec<String>> {
        self.listings
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("no listing at {url}"))
    }
}

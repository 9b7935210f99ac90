use anyhow::{Context, Result};
use async_trait::async_trait;
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::sink::{AudioSink, FinishNotifier};

/// [`AudioSink`] over a songbird voice call, streaming direct HTTP locators.
pub struct SongbirdSink {
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
    current: Option<TrackHandle>,
}

impl SongbirdSink {
    pub fn new(call: Arc<Mutex<Call>>, http: reqwest::Client) -> Self {
        Self {
            call,
            http,
            current: None,
        }
    }

    async fn play_mode(&self) -> Option<PlayMode> {
        let handle = self.current.as_ref()?;
        match handle.get_info().await {
            Ok(state) => Some(state.playing),
            Err(e) => {
                debug!("track state unavailable: {:?}", e);
                None
            }
        }
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn start(&mut self, locator: &str, on_finished: FinishNotifier) -> Result<()> {
        if let Some(previous) = self.current.take() {
            let _ = previous.stop();
        }

        let input = Input::from(HttpRequest::new(self.http.clone(), locator.to_string()));
        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };

        handle
            .add_event(
                Event::Track(TrackEvent::End),
                StreamFinished {
                    notifier: on_finished.clone(),
                },
            )
            .context("Error registering track end handler")?;
        handle
            .add_event(
                Event::Track(TrackEvent::Error),
                StreamFinished {
                    notifier: on_finished,
                },
            )
            .context("Error registering track error handler")?;

        info!("audio stream started");
        self.current = Some(handle);
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        let handle = self.current.as_ref().context("no active stream")?;
        handle.pause().context("Error pausing stream")?;
        debug!("audio stream paused");
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        let handle = self.current.as_ref().context("no active stream")?;
        handle.play().context("Error resuming stream")?;
        debug!("audio stream resumed");
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Play))
    }

    async fn is_paused(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Pause))
    }

    async fn stop(&mut self) {
        if let Some(handle) = self.current.take() {
            if let Err(e) = handle.stop() {
                warn!("Error stopping stream: {:?}", e);
            }
        }
        self.call.lock().await.stop();
        debug!("audio stream released");
    }
}

/// Forwards songbird's end/error events to the owning session.
struct StreamFinished {
    notifier: FinishNotifier,
}

#[async_trait]
impl VoiceEventHandler for StreamFinished {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!("stream {} finished", self.notifier.generation());
        self.notifier.notify();
        None
    }
}

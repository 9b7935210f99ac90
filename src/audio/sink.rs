use anyhow::Result;
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tracing::debug;

use super::session::SessionCommand;

/// Output device a session streams into.
///
/// `stop` must be called before a sink is dropped so the underlying stream
/// and its decoder are released.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Starts streaming `locator`, replacing whatever was playing.
    /// `on_finished` fires once when the stream ends or errors out.
    async fn start(&mut self, locator: &str, on_finished: FinishNotifier) -> Result<()>;

    async fn pause(&mut self) -> Result<()>;

    async fn resume(&mut self) -> Result<()>;

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;

    async fn stop(&mut self);
}

/// Completion signal for one started stream.
///
/// Delivers [`SessionCommand::TrackFinished`] into the owning session's
/// command channel instead of calling back into session state. Clones share
/// the fired flag, so end and error events for one stream advance only once.
#[derive(Debug, Clone)]
pub struct FinishNotifier {
    commands: mpsc::UnboundedSender<SessionCommand>,
    generation: u64,
    fired: Arc<AtomicBool>,
}

impl FinishNotifier {
    pub(crate) fn new(commands: mpsc::UnboundedSender<SessionCommand>, generation: u64) -> Self {
        Self {
            commands,
            generation,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn notify(&self) {
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        if self
            .commands
            .send(SessionCommand::TrackFinished {
                generation: self.generation,
            })
            .is_err()
        {
            debug!("stream {} finished after its session closed", self.generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifier_fires_once_across_clones() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = FinishNotifier::new(tx, 7);
        let clone = notifier.clone();

        notifier.notify();
        clone.notify();

        match rx.try_recv() {
            Ok(SessionCommand::TrackFinished { generation }) => assert_eq!(generation, 7),
            other => panic!("unexpected {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }
}

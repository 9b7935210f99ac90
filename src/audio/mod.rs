//! # Audio Module
//!
//! Per-guild playback: the queue, the session state machine that drives it,
//! and the sink it streams into.
//!
//! ## Architecture
//!
//! ### [`queue`] - Track Queue
//! - Ordered list with a movable cursor; nothing is removed while playing
//! - Index-linked arena, identified by a process-unique [`queue::QueueId`]
//!
//! ### [`session`] - Playback Session
//! - One task per guild consuming a command channel
//! - User commands, stream completions and background playlist appends are
//!   all messages, applied in arrival order
//!
//! ### [`sink`] / [`player`] - Audio Output
//! - [`sink::AudioSink`] abstracts the voice stream
//! - [`player::SongbirdSink`] plays HTTP locators through a songbird call
//!
//! ### [`registry`] - Session Registry
//! - Guild id to session handle, created on guild join, removed on leave
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use jukebox::audio::{registry::SessionRegistry, session::PlayRequest};
//! use serenity::all::{ChannelId, GuildId};
//!
//! # async fn example(registry: &SessionRegistry) -> anyhow::Result<()> {
//! let session = registry.get_or_create(GuildId::new(123456789));
//! let request = PlayRequest {
//!     voice_channel: ChannelId::new(1),
//!     text_channel: ChannelId::new(2),
//! };
//!
//! session.add_to_queue("https://www.youtube.com/watch?v=dQw4w9WgXcQ", request).await?;
//! session.toggle_loop().await?;
//! session.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod player;
pub mod queue;
pub mod registry;
pub mod session;
pub mod sink;

pub use queue::{QueueId, TrackQueue};
pub use registry::SessionRegistry;
pub use session::{Ack, PlayRequest, PlaybackState, SessionHandle, SessionSnapshot};

//! Discord voice bot that plays YouTube media into a guild's voice channel,
//! one navigable playback session per guild.

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod sources;
pub mod ui;

#[cfg(test)]
mod testing;

//! # Audio Module
//!
//! Per-guild playback for Guild Tunes.
//!
//! ## Architecture
//!
//! ### [`registry`] - Player Registry
//! - One [`Player`] per guild, created on first use
//! - Idle players evict themselves through a channel
//!
//! ### [`player`] - Player State Machine
//! - FIFO queue and the playlists it contains
//! - Two-phase playlist loading (head window, then backfill)
//! - Track completion applied by a per-player event task
//!
//! ### [`inactivity`] - Idle Monitor
//! - Periodic check that leaves the voice channel after a quiet period
//!
//! ### [`voice`] / [`songbird_sink`] - Voice Transport
//! - [`VoiceSink`] / [`VoiceConnection`] abstract the driver
//! - [`SongbirdSink`] is the production implementation

pub mod inactivity;
pub mod player;
pub mod queue;
pub mod registry;
pub mod songbird_sink;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;

pub use player::{Invocation, Player, PlayerSnapshot};
pub use queue::TrackQueue;
pub use registry::PlayerRegistry;
pub use songbird_sink::SongbirdSink;
pub use voice::{PlayerEvent, TrackEndNotifier, VoiceConnection, VoiceSink};

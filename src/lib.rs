//! # Guild Tunes
//!
//! Discord music bot with one FIFO queue per guild, yt-dlp for lookups and
//! songbird for playback.

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod logging;
pub mod sources;
pub mod ui;

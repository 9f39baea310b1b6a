//! Error types for the resolver and voice adapters.
//!
//! The player itself works with [`anyhow::Result`]; these enums exist so the
//! adapters can report failures the player knows how to turn into notices.

use serenity::model::id::{ChannelId, GuildId};
use thiserror::Error;

/// Failures while resolving a query through the extractor.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The extractor binary could not be started
    #[error("failed to spawn extractor: {0}")]
    Spawn(#[from] std::io::Error),

    /// The extractor exited with a non-zero status
    #[error("extractor exited with {status}: {stderr}")]
    Extractor { status: String, stderr: String },

    /// The extractor printed something that is not the expected JSON
    #[error("malformed extractor output: {0}")]
    Parse(#[from] serde_json::Error),

    /// The resolver limiter was closed
    #[error("resolver is shutting down")]
    Closed,
}

/// Failures coming from the voice transport.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("could not join channel {channel} in guild {guild}: {reason}")]
    Join {
        guild: GuildId,
        channel: ChannelId,
        reason: String,
    },

    #[error("voice connection for guild {0} is gone")]
    NotConnected(GuildId),

    #[error("no track is loaded")]
    NoTrack,

    #[error("voice driver error: {0}")]
    Driver(String),
}

pub type VoiceResult<T> = std::result::Result<T, VoiceError>;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::VoiceResult;

/// Eventos que llegan al bucle de eventos de un reproductor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// La reproducción número `seq` terminó (fin natural, stop o error)
    TrackEnded { seq: u64 },
}

/// Completion callback handed to [`VoiceConnection::play`].
///
/// Calling [`notify`](Self::notify) only posts an event to the owning player;
/// it never touches player state, so it is safe from any driver thread.
#[derive(Debug, Clone)]
pub struct TrackEndNotifier {
    events: mpsc::UnboundedSender<PlayerEvent>,
    seq: u64,
}

impl TrackEndNotifier {
    pub(crate) fn new(events: mpsc::UnboundedSender<PlayerEvent>, seq: u64) -> Self {
        Self { events, seq }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn notify(&self) {
        if self
            .events
            .send(PlayerEvent::TrackEnded { seq: self.seq })
            .is_err()
        {
            debug!("Reproductor ya no existe, fin de pista #{} ignorado", self.seq);
        }
    }
}

/// Entry point of the voice transport.
#[async_trait]
pub trait VoiceSink: Send + Sync {
    /// Joins `channel` (self-deafened) and returns the new connection
    async fn connect(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> VoiceResult<Box<dyn VoiceConnection>>;
}

/// A live voice connection, exclusively owned by one player.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    async fn current_channel(&self) -> Option<ChannelId>;

    async fn is_connected(&self) -> bool;

    async fn move_to(&mut self, channel: ChannelId) -> VoiceResult<()>;

    async fn disconnect(&mut self) -> VoiceResult<()>;

    /// Starts `source`, replacing whatever was loaded. `on_end` fires once
    /// the track finishes, is stopped, or fails.
    async fn play(&mut self, source: &str, on_end: TrackEndNotifier) -> VoiceResult<()>;

    async fn pause(&self) -> VoiceResult<()>;

    async fn resume(&self) -> VoiceResult<()>;

    async fn stop(&self) -> VoiceResult<()>;

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;
}

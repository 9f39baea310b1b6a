use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{player::Player, voice::VoiceSink};
use crate::{config::PlayerSettings, sources::TrackResolver};

/// Solicitud de un reproductor para ser retirado del registro
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Eviction {
    pub guild: GuildId,
    pub player_id: u64,
}

/// Un reproductor por guild, creado la primera vez que se usa.
///
/// Players that go idle ask to be evicted through a channel; the request
/// carries the player id so a newer player for the same guild is never
/// removed by a stale request.
pub struct PlayerRegistry {
    players: Arc<DashMap<GuildId, Arc<Player>>>,
    resolver: Arc<dyn TrackResolver>,
    sink: Arc<dyn VoiceSink>,
    settings: PlayerSettings,
    next_id: AtomicU64,
    evictions: mpsc::UnboundedSender<Eviction>,
}

impl PlayerRegistry {
    pub fn new(
        resolver: Arc<dyn TrackResolver>,
        sink: Arc<dyn VoiceSink>,
        settings: PlayerSettings,
    ) -> Self {
        let players = Arc::new(DashMap::new());
        let (evictions, rx) = mpsc::unbounded_channel();

        tokio::spawn(reap(players.clone(), rx));

        Self {
            players,
            resolver,
            sink,
            settings,
            next_id: AtomicU64::new(1),
            evictions,
        }
    }

    /// Devuelve el reproductor de la guild, creándolo si no existe
    pub fn get_or_create(&self, guild: GuildId) -> Arc<Player> {
        let mut player = self
            .players
            .entry(guild)
            .or_insert_with(|| self.spawn_player(guild));

        // Apagado por inactividad pero aún sin desalojar
        if player.is_retired() {
            debug!("Reemplazando reproductor #{} apagado en guild {}", player.id(), guild);
            *player = self.spawn_player(guild);
        }
        player.clone()
    }

    fn spawn_player(&self, guild: GuildId) -> Arc<Player> {
        Player::spawn(
            self.next_id.fetch_add(1, Ordering::Relaxed),
            guild,
            self.settings.clone(),
            self.resolver.clone(),
            self.sink.clone(),
            Some(self.evictions.clone()),
        )
    }

    pub fn get(&self, guild: GuildId) -> Option<Arc<Player>> {
        self.players.get(&guild).map(|entry| entry.clone())
    }

    /// Retira el reproductor de la guild y detiene sus tareas
    pub fn evict(&self, guild: GuildId) -> Option<Arc<Player>> {
        let (_, player) = self.players.remove(&guild)?;
        player.shutdown();
        info!("🧹 Reproductor #{} de guild {} retirado", player.id(), guild);
        Some(player)
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

async fn reap(
    players: Arc<DashMap<GuildId, Arc<Player>>>,
    mut evictions: mpsc::UnboundedReceiver<Eviction>,
) {
    while let Some(Eviction { guild, player_id }) = evictions.recv().await {
        match players.remove_if(&guild, |_, player| player.id() == player_id) {
            Some((_, player)) => {
                player.shutdown();
                info!("🧹 Reproductor #{} de guild {} retirado por inactividad", player_id, guild);
            }
            None => debug!("Desalojo obsoleto de reproductor #{} en guild {}", player_id, guild),
        }
    }
}

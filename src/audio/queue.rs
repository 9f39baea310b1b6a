use std::collections::VecDeque;
use tracing::{debug, info};

use crate::sources::Track;

/// Cola FIFO de un reproductor junto con las playlists que tiene encoladas.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<Track>,
    // Identificadores de playlist en orden de llegada
    playlists: VecDeque<String>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega una pista al final de la cola
    pub fn push(&mut self, track: Track) {
        debug!("➕ Agregado a la cola: {}", track.title());
        self.items.push_back(track);
    }

    /// Agrega varias pistas respetando su orden; devuelve cuántas se añadieron
    pub fn extend<I>(&mut self, tracks: I) -> usize
    where
        I: IntoIterator<Item = Track>,
    {
        let before = self.items.len();
        self.items.extend(tracks);
        let added = self.items.len() - before;
        debug!("➕ Agregadas {} canciones a la cola", added);
        added
    }

    /// Obtiene el siguiente track (FIFO - First In, First Out)
    pub fn pop_next(&mut self) -> Option<Track> {
        let next = self.items.pop_front();
        if let Some(ref item) = next {
            debug!("➡️ Siguiente en cola (FIFO): {}", item.title());
        }
        next
    }

    /// Limpia la cola (las playlists registradas se conservan)
    pub fn clear(&mut self) {
        self.items.clear();
        info!("🗑️ Cola limpiada");
    }

    /// Limpia cola y registro de playlists
    pub fn reset(&mut self) {
        self.items.clear();
        self.playlists.clear();
    }

    pub fn register_playlist(&mut self, playlist: impl Into<String>) {
        self.playlists.push_back(playlist.into());
    }

    /// Retira la playlist más antigua y elimina de la cola sus pistas pendientes.
    ///
    /// Returns the playlist id and how many queued tracks were removed, or
    /// `None` when no playlist is registered.
    pub fn skip_oldest_playlist(&mut self) -> Option<(String, usize)> {
        let playlist = self.playlists.pop_front()?;

        let before = self.items.len();
        self.items
            .retain(|track| track.playlist() != Some(playlist.as_str()));
        let removed = before - self.items.len();

        info!("⏭️ Playlist {} saltada, {} pistas eliminadas", playlist, removed);
        Some((playlist, removed))
    }

    pub fn playlists(&self) -> impl Iterator<Item = &str> {
        self.playlists.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

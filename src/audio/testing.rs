//! Dobles de prueba para el reproductor: transporte de voz falso, resolver
//! en memoria y un notificador que graba los avisos.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::Notify;

use super::{
    player::{Invocation, Player},
    voice::{TrackEndNotifier, VoiceConnection, VoiceSink},
};
use crate::{
    config::PlayerSettings,
    error::{ResolveError, VoiceError, VoiceResult},
    sources::{PlaylistBatch, Track, TrackResolver},
    ui::{Notice, Notifier},
};

pub(crate) const GUILD: GuildId = GuildId::new(7);
pub(crate) const VOICE: ChannelId = ChannelId::new(100);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FakeMode {
    #[default]
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Default)]
pub(crate) struct FakeVoiceState {
    pub connected: bool,
    pub channel: Option<ChannelId>,
    pub mode: FakeMode,
    pub played: Vec<String>,
    pub connects: usize,
    pub moves: Vec<ChannelId>,
    pub disconnects: usize,
    pub stops: usize,
    pub fail_connect: bool,
    pub fail_play: bool,
    on_end: Option<TrackEndNotifier>,
}

impl FakeVoiceState {
    fn end_current(&mut self) {
        self.mode = FakeMode::Idle;
        if let Some(on_end) = self.on_end.take() {
            on_end.notify();
        }
    }
}

/// Transporte de voz en memoria; todas las conexiones comparten estado
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeVoice {
    inner: Arc<Mutex<FakeVoiceState>>,
}

impl FakeVoice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeVoiceState) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn played(&self) -> Vec<String> {
        self.inner.lock().played.clone()
    }

    pub fn mode(&self) -> FakeMode {
        self.inner.lock().mode
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    /// Simula el fin natural de la pista en curso
    pub fn finish_track(&self) {
        self.inner.lock().end_current();
    }
}

#[async_trait]
impl VoiceSink for FakeVoice {
    async fn connect(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> VoiceResult<Box<dyn VoiceConnection>> {
        let mut state = self.inner.lock();
        if state.fail_connect {
            return Err(VoiceError::Join {
                guild,
                channel,
                reason: "canal lleno".to_string(),
            });
        }

        state.connected = true;
        state.channel = Some(channel);
        state.connects += 1;

        Ok(Box::new(FakeConnection {
            inner: self.inner.clone(),
        }))
    }
}

struct FakeConnection {
    inner: Arc<Mutex<FakeVoiceState>>,
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn current_channel(&self) -> Option<ChannelId> {
        self.inner.lock().channel
    }

    async fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    async fn move_to(&mut self, channel: ChannelId) -> VoiceResult<()> {
        let mut state = self.inner.lock();
        state.channel = Some(channel);
        state.moves.push(channel);
        Ok(())
    }

    async fn disconnect(&mut self) -> VoiceResult<()> {
        let mut state = self.inner.lock();
        state.end_current();
        state.connected = false;
        state.channel = None;
        state.disconnects += 1;
        Ok(())
    }

    async fn play(&mut self, source: &str, on_end: TrackEndNotifier) -> VoiceResult<()> {
        let mut state = self.inner.lock();
        if state.fail_play {
            return Err(VoiceError::Driver(format!("fuente inválida: {source}")));
        }

        // play_only_input reemplaza lo que hubiera cargado
        state.end_current();
        state.mode = FakeMode::Playing;
        state.played.push(source.to_string());
        state.on_end = Some(on_end);
        Ok(())
    }

    async fn pause(&self) -> VoiceResult<()> {
        let mut state = self.inner.lock();
        if state.mode == FakeMode::Playing {
            state.mode = FakeMode::Paused;
        }
        Ok(())
    }

    async fn resume(&self) -> VoiceResult<()> {
        let mut state = self.inner.lock();
        if state.mode == FakeMode::Paused {
            state.mode = FakeMode::Playing;
        }
        Ok(())
    }

    async fn stop(&self) -> VoiceResult<()> {
        let mut state = self.inner.lock();
        state.stops += 1;
        state.end_current();
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        self.inner.lock().mode == FakeMode::Playing
    }

    async fn is_paused(&self) -> bool {
        self.inner.lock().mode == FakeMode::Paused
    }
}

/// Resolver en memoria. Las playlists completas pueden quedar retenidas
/// hasta que se libere `gate`.
#[derive(Default)]
pub(crate) struct FakeResolver {
    tracks: HashMap<String, Track>,
    playlists: HashMap<String, PlaylistBatch>,
    gate: Option<Arc<Notify>>,
    pub full_calls: AtomicUsize,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, query: &str, title: &str) -> Self {
        self.tracks.insert(query.to_string(), source_track(title));
        self
    }

    pub fn with_playlist(mut self, url: &str, titles: &[&str], unavailable: usize) -> Self {
        let tracks = titles
            .iter()
            .map(|title| source_track(title).in_playlist(url))
            .collect();
        self.playlists.insert(
            url.to_string(),
            PlaylistBatch {
                tracks,
                unavailable,
            },
        );
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn truncated(&self, query: &str, limit: usize) -> Option<PlaylistBatch> {
        self.playlists.get(query).map(|batch| PlaylistBatch {
            tracks: batch.tracks.iter().take(limit).cloned().collect(),
            unavailable: batch.unavailable,
        })
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn resolve_track(&self, query: &str) -> Result<Option<Track>, ResolveError> {
        Ok(self.tracks.get(query).cloned())
    }

    async fn resolve_playlist(
        &self,
        query: &str,
        max_tracks: usize,
    ) -> Result<Option<PlaylistBatch>, ResolveError> {
        self.full_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(self.truncated(query, max_tracks))
    }

    async fn resolve_playlist_window(
        &self,
        query: &str,
        window: usize,
    ) -> Result<Option<PlaylistBatch>, ResolveError> {
        Ok(self.truncated(query, window).map(|mut batch| {
            batch.unavailable = 0;
            batch
        }))
    }
}

/// Pista cuya fuente es `https://cdn/<title>`
pub(crate) fn source_track(title: &str) -> Track {
    Track::new(format!("https://cdn/{title}"), title)
}

/// Notificador que guarda todo lo enviado
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<Notice>>,
    deleted: Mutex<Vec<MessageId>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.sent.lock().clone()
    }

    pub fn last(&self) -> Option<Notice> {
        self.sent.lock().last().cloned()
    }

    pub fn contains(&self, notice: &Notice) -> bool {
        self.sent.lock().contains(notice)
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notice: Notice) -> anyhow::Result<MessageId> {
        let mut sent = self.sent.lock();
        sent.push(notice);
        Ok(MessageId::new(sent.len() as u64))
    }

    async fn delete(&self, message: MessageId) -> anyhow::Result<()> {
        self.deleted.lock().push(message);
        Ok(())
    }
}

pub(crate) fn invocation(reply: &Arc<RecordingNotifier>) -> Invocation {
    Invocation {
        voice_channel: Some(VOICE),
        reply: reply.clone(),
    }
}

pub(crate) fn spawn_player(
    resolver: impl TrackResolver + 'static,
    voice: &FakeVoice,
    settings: PlayerSettings,
) -> Arc<Player> {
    Player::spawn(
        1,
        GUILD,
        settings,
        Arc::new(resolver),
        Arc::new(voice.clone()),
        None,
    )
}

/// Deja correr las tareas en segundo plano (bucle de eventos, monitor)
pub(crate) async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

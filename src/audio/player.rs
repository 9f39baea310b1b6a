use anyhow::Result;
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::{
    fmt,
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::{
    sync::{mpsc, Mutex, MutexGuard},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    inactivity,
    queue::TrackQueue,
    registry::Eviction,
    voice::{PlayerEvent, TrackEndNotifier, VoiceConnection, VoiceSink},
};
use crate::{
    config::PlayerSettings,
    error::ResolveError,
    sources::{is_playlist_query, Track, TrackResolver},
    ui::{queue_pages, Notice, Notifier},
};

/// Contexto de un comando: dónde está quien lo pidió y por dónde contestar
#[derive(Clone)]
pub struct Invocation {
    pub voice_channel: Option<ChannelId>,
    pub reply: Arc<dyn Notifier>,
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("voice_channel", &self.voice_channel)
            .finish_non_exhaustive()
    }
}

/// Copia del estado de un reproductor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub current: Option<Track>,
    pub queue: Vec<Track>,
    pub playlists: Vec<String>,
    pub playlist_loading: bool,
    pub connected: bool,
}

struct PlayerState {
    queue: TrackQueue,
    current: Option<Track>,
    // Número de la reproducción en curso; los fines de pista de otra reproducción se ignoran
    play_seq: u64,
    // Sube con cada desconexión; una carga de playlist de otra sesión se descarta
    session: u64,
    playlist_loading: bool,
    last_activity: Instant,
    connection: Option<Box<dyn VoiceConnection>>,
    // Último canal desde el que se usó el bot, para los avisos sin comando
    reply: Option<Arc<dyn Notifier>>,
}

/// Reproductor de una guild.
///
/// All state lives behind a single async mutex. The lock is never held while
/// the resolver runs, so a slow playlist fetch does not stall skip or pause;
/// `playlist_loading` is what keeps other commands out during ingestion.
/// Track completions arrive as [`PlayerEvent`]s and are applied by a
/// per-player event task, never from the voice driver directly.
pub struct Player {
    id: u64,
    guild: GuildId,
    settings: PlayerSettings,
    resolver: Arc<dyn TrackResolver>,
    sink: Arc<dyn VoiceSink>,
    state: Mutex<PlayerState>,
    events: mpsc::UnboundedSender<PlayerEvent>,
    evictions: Option<mpsc::UnboundedSender<Eviction>>,
    shutdown: CancellationToken,
}

impl Player {
    /// Crea el reproductor y lanza su bucle de eventos y su monitor de inactividad
    pub(crate) fn spawn(
        id: u64,
        guild: GuildId,
        settings: PlayerSettings,
        resolver: Arc<dyn TrackResolver>,
        sink: Arc<dyn VoiceSink>,
        evictions: Option<mpsc::UnboundedSender<Eviction>>,
    ) -> Arc<Self> {
        let (events, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let player = Arc::new(Self {
            id,
            guild,
            resolver,
            sink,
            state: Mutex::new(PlayerState {
                queue: TrackQueue::new(),
                current: None,
                play_seq: 0,
                session: 0,
                playlist_loading: false,
                last_activity: Instant::now(),
                connection: None,
                reply: None,
            }),
            events,
            evictions,
            shutdown: shutdown.clone(),
            settings,
        });

        tokio::spawn(run_events(Arc::downgrade(&player), rx, shutdown.clone()));
        tokio::spawn(inactivity::watch(
            Arc::downgrade(&player),
            player.settings.inactivity_poll_interval,
            player.settings.inactivity_timeout,
            shutdown,
        ));

        info!("🎛️ Reproductor #{} creado para guild {}", id, guild);
        player
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// `true` cuando el reproductor ya fue apagado y no debe atender comandos
    pub fn is_retired(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub async fn snapshot(&self) -> PlayerSnapshot {
        let state = self.state.lock().await;
        let connected = match &state.connection {
            Some(connection) => connection.is_connected().await,
            None => false,
        };

        PlayerSnapshot {
            current: state.current.clone(),
            queue: state.queue.iter().cloned().collect(),
            playlists: state.queue.playlists().map(String::from).collect(),
            playlist_loading: state.playlist_loading,
            connected,
        }
    }

    /// Punto de entrada de `play`: decide entre pista suelta y playlist
    pub async fn handle_query(&self, inv: &Invocation, query: &str) -> Result<()> {
        let loading = {
            let mut state = self.state.lock().await;
            touch(&mut state, inv);
            state.playlist_loading
        };

        if loading {
            inv.reply.send(Notice::Busy).await?;
            return Ok(());
        }

        let query = query.trim();
        if query.is_empty() {
            inv.reply.send(Notice::Usage).await?;
            return Ok(());
        }

        if is_playlist_query(query) {
            self.add_playlist(inv, query).await
        } else {
            self.add_track(inv, query).await
        }
    }

    /// Resuelve una pista, la encola y arranca la reproducción si estaba parado
    pub async fn add_track(&self, inv: &Invocation, query: &str) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            touch(&mut state, inv);
            if !self.ensure_connected(&mut state, inv).await? {
                return Ok(());
            }
        }

        let track = resolved(query, self.resolver.resolve_track(query).await);
        let Some(track) = track else {
            inv.reply.send(Notice::NotFound).await?;
            return Ok(());
        };

        let title = track.title().to_string();
        {
            let mut state = self.state.lock().await;
            touch(&mut state, inv);
            state.queue.push(track);
            info!("➕ {} agregado a la cola de guild {}", title, self.guild);
            self.play_next_locked(&mut state).await;
        }

        inv.reply.send(Notice::Added { title }).await?;
        Ok(())
    }

    /// Carga una playlist en dos fases: primero una ventana corta para empezar
    /// a sonar, luego el resto sin repetir lo ya encolado.
    pub async fn add_playlist(&self, inv: &Invocation, query: &str) -> Result<()> {
        let session = {
            let mut state = self.state.lock().await;
            touch(&mut state, inv);
            if !self.ensure_connected(&mut state, inv).await? {
                return Ok(());
            }
            if state.playlist_loading {
                drop(state);
                inv.reply.send(Notice::Busy).await?;
                return Ok(());
            }
            state.playlist_loading = true;
            state.session
        };

        // Nada de `?` hasta bajar la bandera de carga
        let progress = match inv.reply.send(Notice::PlaylistLoading).await {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("⚠️ No se pudo enviar aviso de carga: {:?}", e);
                None
            }
        };

        let window = self.settings.track_window;
        let head = resolved(
            query,
            self.resolver.resolve_playlist_window(query, window).await,
        )
        .unwrap_or_default();

        let head_len = head.len();
        if head_len > 0 {
            let mut state = self.state.lock().await;
            if state.session != session {
                debug!("Ventana de playlist descartada: guild {} desconectada", self.guild);
                return self.abandon_playlist(state, inv, progress).await;
            }
            state.queue.extend(head.tracks);
            debug!("📋 Ventana de {} pistas encolada en guild {}", head_len, self.guild);
            self.play_next_locked(&mut state).await;
        }

        let full = resolved(
            query,
            self.resolver
                .resolve_playlist(query, self.settings.max_playlist_tracks)
                .await,
        );

        let outcome = {
            let mut state = self.state.lock().await;
            if state.session != session {
                debug!("Playlist descartada: guild {} desconectada durante la carga", self.guild);
                return self.abandon_playlist(state, inv, progress).await;
            }
            state.playlist_loading = false;
            touch(&mut state, inv);

            match full.filter(|batch| !batch.is_empty()) {
                Some(batch) => {
                    let unavailable = batch.unavailable;
                    let added = state.queue.extend(batch.tracks.into_iter().skip(head_len));
                    state.queue.register_playlist(query);
                    info!(
                        "📋 Playlist cargada en guild {}: {} pistas ({} no disponibles)",
                        self.guild,
                        head_len + added,
                        unavailable
                    );
                    self.play_next_locked(&mut state).await;
                    Some((added, unavailable))
                }
                None => None,
            }
        };

        if let Some(message) = progress {
            if let Err(e) = inv.reply.delete(message).await {
                warn!("⚠️ No se pudo borrar el aviso de carga: {:?}", e);
            }
        }

        match outcome {
            Some((count, unavailable)) => {
                if unavailable > 0 {
                    inv.reply
                        .send(Notice::Unavailable { count: unavailable })
                        .await?;
                }
                inv.reply.send(Notice::PlaylistAdded { count }).await?;
            }
            None => {
                warn!("❌ Playlist sin resultados: {}", query);
                inv.reply.send(Notice::PlaylistInvalid).await?;
            }
        }

        Ok(())
    }

    pub async fn show_queue(&self, inv: &Invocation) -> Result<()> {
        let pages = {
            let mut state = self.state.lock().await;
            touch(&mut state, inv);
            if state.playlist_loading {
                vec![Notice::Busy]
            } else if state.queue.is_empty() {
                vec![Notice::QueueEmpty]
            } else {
                queue_pages(state.queue.iter(), self.settings.queue_page_size)
            }
        };

        for page in pages {
            inv.reply.send(page).await?;
        }
        Ok(())
    }

    pub async fn clear_queue(&self, inv: &Invocation) -> Result<()> {
        let notice = {
            let mut state = self.state.lock().await;
            touch(&mut state, inv);
            if state.playlist_loading {
                Notice::Busy
            } else if state.queue.is_empty() {
                Notice::QueueEmpty
            } else {
                state.queue.clear();
                Notice::Cleared
            }
        };

        inv.reply.send(notice).await?;
        Ok(())
    }

    /// Detiene la pista actual; el siguiente de la cola empieza enseguida
    pub async fn skip(&self, inv: &Invocation) -> Result<()> {
        let notice = {
            let mut state = self.state.lock().await;
            touch(&mut state, inv);

            if !is_playing(&state).await {
                return Ok(());
            }
            if state.playlist_loading {
                Notice::Busy
            } else {
                if let Some(connection) = &state.connection {
                    if let Err(e) = connection.stop().await {
                        warn!("⚠️ Error al detener pista en guild {}: {}", self.guild, e);
                    }
                }
                // Con un driver síncrono ya no suena nada; si no, avanza el bucle de eventos
                if !is_playing(&state).await {
                    self.play_next_locked(&mut state).await;
                }
                Notice::Skipped
            }
        };

        inv.reply.send(notice).await?;
        Ok(())
    }

    /// Quita de la cola las pistas de la playlist más antigua
    pub async fn skip_playlist(&self, inv: &Invocation) -> Result<()> {
        let notice = {
            let mut state = self.state.lock().await;
            touch(&mut state, inv);

            if !is_playing(&state).await {
                return Ok(());
            }
            if state.playlist_loading {
                Notice::Busy
            } else {
                match state.queue.skip_oldest_playlist() {
                    Some(_) => Notice::PlaylistSkipped,
                    None => Notice::NoPlaylist,
                }
            }
        };

        inv.reply.send(notice).await?;
        Ok(())
    }

    /// Alterna pausa/reanudar
    pub async fn toggle_pause(&self, inv: &Invocation) -> Result<()> {
        let notice = {
            let mut state = self.state.lock().await;
            touch(&mut state, inv);

            let Some(connection) = &state.connection else {
                return Ok(());
            };

            if connection.is_playing().await {
                connection.pause().await?;
                info!("⏸️ Pausado en guild {}", self.guild);
                Notice::Paused
            } else if connection.is_paused().await {
                connection.resume().await?;
                info!("▶️ Reanudado en guild {}", self.guild);
                Notice::Resumed
            } else {
                return Ok(());
            }
        };

        inv.reply.send(notice).await?;
        Ok(())
    }

    /// Termina una carga cuya sesión de voz ya se cerró: no encola ni avisa nada
    async fn abandon_playlist(
        &self,
        mut state: MutexGuard<'_, PlayerState>,
        inv: &Invocation,
        progress: Option<MessageId>,
    ) -> Result<()> {
        state.playlist_loading = false;
        drop(state);

        if let Some(message) = progress {
            if let Err(e) = inv.reply.delete(message).await {
                warn!("⚠️ No se pudo borrar el aviso de carga: {:?}", e);
            }
        }
        Ok(())
    }

    /// Vacía la cola y sale del canal de voz
    pub async fn disconnect(&self, inv: &Invocation) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            touch(&mut state, inv);

            let Some(mut connection) = state.connection.take() else {
                return Ok(());
            };
            if !connection.is_connected().await {
                return Ok(());
            }

            state.queue.reset();
            state.current = None;
            state.session += 1;
            if let Err(e) = connection.disconnect().await {
                warn!("⚠️ Error al desconectar en guild {}: {}", self.guild, e);
            }
        }

        inv.reply.send(Notice::Disconnected).await?;
        Ok(())
    }

    /// Sale del canal si lleva más de `timeout` sin actividad y sin sonar.
    /// Devuelve `true` si desconectó.
    pub(crate) async fn disconnect_if_idle(&self, timeout: Duration) -> bool {
        let reply = {
            let mut state = self.state.lock().await;

            let Some(connection) = &state.connection else {
                return false;
            };
            if !connection.is_connected().await || connection.is_playing().await {
                return false;
            }
            let idle = state.last_activity.elapsed();
            if idle <= timeout {
                return false;
            }

            if let Some(mut connection) = state.connection.take() {
                if let Err(e) = connection.disconnect().await {
                    warn!("⚠️ Error al desconectar en guild {}: {}", self.guild, e);
                }
            }
            state.current = None;
            state.session += 1;
            // Este reproductor no vuelve a usarse; el registro creará otro
            self.shutdown.cancel();
            info!(
                "💤 Guild {} inactiva durante {}, saliendo del canal",
                self.guild,
                humantime::format_duration(Duration::from_secs(idle.as_secs()))
            );
            state.reply.clone()
        };

        if let Some(reply) = reply {
            notify_quietly(reply.as_ref(), Notice::IdleDisconnect).await;
        }
        true
    }

    /// Pide al registro que olvide este reproductor
    pub(crate) fn request_eviction(&self) {
        if let Some(evictions) = &self.evictions {
            let eviction = Eviction {
                guild: self.guild,
                player_id: self.id,
            };
            if evictions.send(eviction).is_err() {
                debug!("Registro cerrado, reproductor #{} no desalojado", self.id);
            }
        }
    }

    /// Olvida la conexión de voz cuando el bot fue sacado del canal desde fuera
    pub async fn forget_connection(&self) {
        let mut state = self.state.lock().await;
        if state.connection.take().is_some() {
            state.current = None;
            state.session += 1;
            info!("🔌 Conexión de voz de guild {} cerrada externamente", self.guild);
        }
    }

    /// Detiene las tareas en segundo plano
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn ensure_connected(&self, state: &mut PlayerState, inv: &Invocation) -> Result<bool> {
        if self.is_retired() {
            warn!("⚠️ Reproductor #{} de guild {} ya apagado, se ignora el comando", self.id, self.guild);
            inv.reply.send(Notice::JoinFailed).await?;
            return Ok(false);
        }

        let Some(channel) = inv.voice_channel else {
            inv.reply.send(Notice::NotInVoice).await?;
            return Ok(false);
        };

        if let Some(connection) = state.connection.as_mut() {
            if connection.is_connected().await {
                if connection.current_channel().await != Some(channel) {
                    if let Err(e) = connection.move_to(channel).await {
                        error!("❌ No se pudo mover al canal {}: {}", channel, e);
                        inv.reply.send(Notice::JoinFailed).await?;
                        return Ok(false);
                    }
                }
                return Ok(true);
            }
        }

        match self.sink.connect(self.guild, channel).await {
            Ok(connection) => {
                state.connection = Some(connection);
                Ok(true)
            }
            Err(e) => {
                error!("❌ Error al unirse al canal de voz: {}", e);
                inv.reply.send(Notice::JoinFailed).await?;
                Ok(false)
            }
        }
    }

    /// Arranca la siguiente pista si hay conexión y no hay nada sonando ni en pausa
    async fn play_next_locked(&self, state: &mut PlayerState) {
        let Some(connection) = state.connection.as_mut() else {
            return;
        };
        if !connection.is_connected().await {
            debug!("Sin conexión de voz en guild {}, no se reproduce", self.guild);
            return;
        }
        if connection.is_playing().await || connection.is_paused().await {
            return;
        }

        let Some(track) = state.queue.pop_next() else {
            return;
        };

        state.play_seq += 1;
        let on_end = TrackEndNotifier::new(self.events.clone(), state.play_seq);

        info!("🎵 Reproduciendo en guild {}: {}", self.guild, track.title());
        let result = connection.play(track.source(), on_end.clone()).await;
        let title = track.title().to_string();
        state.current = Some(track);

        if let Err(e) = result {
            error!("❌ Error reproduciendo {}: {}", title, e);
            if let Some(reply) = &state.reply {
                notify_quietly(reply.as_ref(), Notice::PlaybackFailed { title }).await;
            }
            // Se avanza por el mismo camino que un fin de pista normal
            on_end.notify();
        }
    }

    async fn on_track_end(&self, seq: u64) {
        let mut state = self.state.lock().await;
        if seq != state.play_seq || state.current.is_none() {
            debug!("Fin de pista #{} obsoleto en guild {}", seq, self.guild);
            return;
        }

        if let Some(track) = state.current.take() {
            debug!("✅ Terminó: {}", track.title());
        }

        if !state.queue.is_empty() {
            state.last_activity = Instant::now();
            self.play_next_locked(&mut state).await;
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn touch(state: &mut PlayerState, inv: &Invocation) {
    state.last_activity = Instant::now();
    state.reply = Some(inv.reply.clone());
}

async fn is_playing(state: &PlayerState) -> bool {
    match &state.connection {
        Some(connection) => connection.is_playing().await,
        None => false,
    }
}

/// Los errores del resolver se registran y cuentan como "sin resultados"
fn resolved<T>(query: &str, result: Result<Option<T>, ResolveError>) -> Option<T> {
    match result {
        Ok(found) => found,
        Err(e) => {
            warn!("⚠️ Error resolviendo '{}': {}", query, e);
            None
        }
    }
}

async fn notify_quietly(reply: &dyn Notifier, notice: Notice) {
    if let Err(e) = reply.send(notice).await {
        warn!("⚠️ No se pudo enviar aviso: {:?}", e);
    }
}

async fn run_events(
    player: Weak<Player>,
    mut events: mpsc::UnboundedReceiver<PlayerEvent>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let Some(player) = player.upgrade() else {
            break;
        };

        match event {
            PlayerEvent::TrackEnded { seq } => player.on_track_end(seq).await,
        }
    }

    debug!("Bucle de eventos del reproductor terminado");
}

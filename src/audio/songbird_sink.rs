use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::voice::{TrackEndNotifier, VoiceConnection, VoiceSink};
use crate::error::{VoiceError, VoiceResult};

/// Sink de voz respaldado por songbird
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdSink {
    pub fn new(manager: Arc<Songbird>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { manager, http })
    }
}

#[async_trait]
impl VoiceSink for SongbirdSink {
    async fn connect(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> VoiceResult<Box<dyn VoiceConnection>> {
        let call = self
            .manager
            .join(guild, channel)
            .await
            .map_err(|e| VoiceError::Join {
                guild,
                channel,
                reason: e.to_string(),
            })?;

        {
            let mut handler = call.lock().await;
            if let Err(e) = handler.deafen(true).await {
                warn!("⚠️ No se pudo ensordecer al bot en guild {}: {:?}", guild, e);
            }
        }

        info!("🔊 Conectado al canal de voz {} en guild {}", channel, guild);

        Ok(Box::new(SongbirdConnection {
            guild,
            manager: self.manager.clone(),
            call,
            http: self.http.clone(),
            track: None,
        }))
    }
}

/// Conexión de voz de una guild concreta
struct SongbirdConnection {
    guild: GuildId,
    manager: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
    track: Option<TrackHandle>,
}

impl SongbirdConnection {
    fn track(&self) -> VoiceResult<&TrackHandle> {
        self.track.as_ref().ok_or(VoiceError::NoTrack)
    }

    async fn play_mode(&self) -> Option<PlayMode> {
        let track = self.track.as_ref()?;
        track.get_info().await.ok().map(|info| info.playing)
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn current_channel(&self) -> Option<ChannelId> {
        let handler = self.call.lock().await;
        handler
            .current_channel()
            .map(|channel_id| ChannelId::from(channel_id.0))
    }

    async fn is_connected(&self) -> bool {
        let handler = self.call.lock().await;
        handler.current_connection().is_some()
    }

    async fn move_to(&mut self, channel: ChannelId) -> VoiceResult<()> {
        // join sobre una llamada existente mueve al bot de canal
        self.call = self
            .manager
            .join(self.guild, channel)
            .await
            .map_err(|e| VoiceError::Join {
                guild: self.guild,
                channel,
                reason: e.to_string(),
            })?;

        info!("🔀 Movido al canal {} en guild {}", channel, self.guild);
        Ok(())
    }

    async fn disconnect(&mut self) -> VoiceResult<()> {
        if let Some(track) = self.track.take() {
            if let Err(e) = track.stop() {
                debug!("Pista ya detenida al desconectar guild {}: {:?}", self.guild, e);
            }
        }

        self.manager
            .remove(self.guild)
            .await
            .map_err(|e| VoiceError::Driver(e.to_string()))?;

        info!("👋 Desconectado del canal de voz en guild {}", self.guild);
        Ok(())
    }

    async fn play(&mut self, source: &str, on_end: TrackEndNotifier) -> VoiceResult<()> {
        let input = Input::from(HttpRequest::new(self.http.clone(), source.to_string()));

        let handle = {
            let mut handler = self.call.lock().await;
            if handler.current_connection().is_none() {
                return Err(VoiceError::NotConnected(self.guild));
            }
            handler.play_only_input(input)
        };

        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackEndHandler {
                        notifier: on_end.clone(),
                    },
                )
                .map_err(|e| VoiceError::Driver(format!("Error al agregar event handler: {}", e)))?;
        }

        debug!("▶️ Pista #{} enviada al driver en guild {}", on_end.seq(), self.guild);
        self.track = Some(handle);
        Ok(())
    }

    async fn pause(&self) -> VoiceResult<()> {
        self.track()?
            .pause()
            .map_err(|e| VoiceError::Driver(e.to_string()))
    }

    async fn resume(&self) -> VoiceResult<()> {
        self.track()?
            .play()
            .map_err(|e| VoiceError::Driver(e.to_string()))
    }

    async fn stop(&self) -> VoiceResult<()> {
        self.track()?
            .stop()
            .map_err(|e| VoiceError::Driver(e.to_string()))
    }

    async fn is_playing(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Play))
    }

    async fn is_paused(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Pause))
    }
}

/// Handler para cuando termina (o falla) una pista
struct TrackEndHandler {
    notifier: TrackEndNotifier,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!("Track #{} terminado", self.notifier.seq());
        self.notifier.notify();
        None
    }
}

//! # Bot Module
//!
//! Discord front end for Guild Tunes.
//!
//! [`TunesBot`] implements Serenity's [`EventHandler`]: it turns prefixed
//! guild messages into [`MusicCommand`]s, enforces per-user cooldowns and
//! hands each command to the guild's player through the [`PlayerRegistry`].
//! Replies go back to the invoking text channel via [`ChannelNotifier`].

use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Message, Ready, UserId, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod notifier;

pub use commands::{Cooldowns, MusicCommand};
pub use notifier::ChannelNotifier;

use crate::{
    audio::{Invocation, PlayerRegistry},
    ui::{Notice, Notifier},
};

/// Manejador de eventos de Discord
pub struct TunesBot {
    registry: Arc<PlayerRegistry>,
    prefixes: Vec<String>,
    cooldowns: Cooldowns,
}

impl TunesBot {
    pub fn new(registry: Arc<PlayerRegistry>, prefixes: Vec<String>) -> Self {
        Self {
            registry,
            prefixes,
            cooldowns: Cooldowns::new(),
        }
    }
}

#[async_trait]
impl EventHandler for TunesBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        let Some((prefix, command)) = MusicCommand::parse(&msg.content, self.prefixes.as_slice())
        else {
            return;
        };

        let reply: Arc<dyn Notifier> = Arc::new(ChannelNotifier::new(ctx.http.clone(), msg.channel_id));

        if let Err(retry_after) = self.cooldowns.check(msg.author.id, &command) {
            debug!("⏳ {} en cooldown para {}", command.name(), msg.author.id);
            if let Err(e) = reply.send(Notice::Cooldown { retry_after }).await {
                warn!("⚠️ No se pudo enviar aviso de cooldown: {:?}", e);
            }
            return;
        }

        let inv = Invocation {
            voice_channel: user_voice_channel(&ctx, guild_id, msg.author.id),
            reply,
        };

        if let Err(e) = commands::dispatch(&self.registry, guild_id, &prefix, command, &inv).await {
            error!("Error manejando comando: {:?}", e);
        }
    }

    /// Si el bot fue sacado del canal desde fuera, se descarta el reproductor de la guild
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        if let Some(player) = self.registry.get(guild_id) {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            player.forget_connection().await;
            self.registry.evict(guild_id);
        }
    }
}

/// Canal de voz en el que está el usuario, según la caché
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

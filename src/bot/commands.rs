use anyhow::Result;
use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::{GuildId, UserId};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{
    audio::{Invocation, PlayerRegistry},
    ui::Notice,
};

/// Comandos de texto reconocidos
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicCommand {
    /// Consulta tal cual la escribió el usuario (puede estar vacía)
    Play(String),
    Queue,
    Clear,
    Skip,
    SkipPlaylist,
    Pause,
    Leave,
    Help,
}

impl MusicCommand {
    /// Interpreta un mensaje como comando si empieza por alguno de los prefijos.
    ///
    /// Command names and aliases are matched case-insensitively; everything
    /// after the name is the argument.
    pub fn parse<S: AsRef<str>>(content: &str, prefixes: &[S]) -> Option<(String, Self)> {
        let content = content.trim_start();
        let (prefix, rest) = prefixes
            .iter()
            .map(|prefix| prefix.as_ref())
            .filter(|prefix| !prefix.is_empty())
            .find_map(|prefix| content.strip_prefix(prefix).map(|rest| (prefix, rest)))?;

        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next()?.to_lowercase();
        let args = parts.next().unwrap_or("").trim();

        let command = match name.as_str() {
            "play" | "p" => Self::Play(args.to_string()),
            "queue" | "list" | "l" | "q" => Self::Queue,
            "clear" | "c" => Self::Clear,
            "skip" | "s" => Self::Skip,
            "skip_playlist" | "skip_p" | "skipplaylist" => Self::SkipPlaylist,
            "pause" | "resume" | "r" => Self::Pause,
            "leave" | "kick" | "disconnect" | "dc" => Self::Leave,
            "help" | "h" => Self::Help,
            _ => return None,
        };

        Some((prefix.to_string(), command))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Play(_) => "play",
            Self::Queue => "queue",
            Self::Clear => "clear",
            Self::Skip => "skip",
            Self::SkipPlaylist => "skip_playlist",
            Self::Pause => "pause",
            Self::Leave => "leave",
            Self::Help => "help",
        }
    }

    /// Tiempo mínimo entre dos usos del mismo comando por el mismo usuario
    pub fn cooldown(&self) -> Option<Duration> {
        let secs = match self {
            Self::Play(_) | Self::Skip | Self::Pause => 1,
            Self::SkipPlaylist | Self::Leave => 2,
            Self::Clear => 3,
            Self::Queue => 5,
            Self::Help => return None,
        };
        Some(Duration::from_secs(secs))
    }
}

/// Cooldowns por usuario y comando
#[derive(Debug, Default)]
pub struct Cooldowns {
    last_use: DashMap<(UserId, &'static str), Instant>,
}

impl Cooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra el uso si está permitido; si no, devuelve cuánto falta
    pub fn check(&self, user: UserId, command: &MusicCommand) -> Result<(), Duration> {
        self.check_at(user, command, Instant::now())
    }

    fn check_at(&self, user: UserId, command: &MusicCommand, now: Instant) -> Result<(), Duration> {
        let Some(cooldown) = command.cooldown() else {
            return Ok(());
        };

        match self.last_use.entry((user, command.name())) {
            Entry::Occupied(mut last) => {
                let elapsed = now.saturating_duration_since(*last.get());
                if elapsed < cooldown {
                    return Err(cooldown - elapsed);
                }
                last.insert(now);
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
            }
        }
        Ok(())
    }
}

/// Ejecuta un comando sobre el reproductor de la guild
pub async fn dispatch(
    registry: &PlayerRegistry,
    guild: GuildId,
    prefix: &str,
    command: MusicCommand,
    inv: &Invocation,
) -> Result<()> {
    debug!("Comando {} en guild {}", command.name(), guild);

    if command == MusicCommand::Help {
        let settings = registry.settings();
        inv.reply
            .send(Notice::Help {
                prefix: prefix.to_string(),
                max_tracks: settings.max_playlist_tracks,
                idle_timeout: settings.inactivity_timeout,
            })
            .await?;
        return Ok(());
    }

    if let MusicCommand::Play(query) = &command {
        if query.trim().is_empty() {
            inv.reply.send(Notice::Usage).await?;
            return Ok(());
        }
    }

    let player = registry.get_or_create(guild);
    match command {
        MusicCommand::Play(query) => player.handle_query(inv, &query).await,
        MusicCommand::Queue => player.show_queue(inv).await,
        MusicCommand::Clear => player.clear_queue(inv).await,
        MusicCommand::Skip => player.skip(inv).await,
        MusicCommand::SkipPlaylist => player.skip_playlist(inv).await,
        MusicCommand::Pause => player.toggle_pause(inv).await,
        MusicCommand::Leave => {
            player.disconnect(inv).await?;
            registry.evict(guild);
            Ok(())
        }
        MusicCommand::Help => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::testing::{invocation, FakeResolver, FakeVoice, RecordingNotifier, GUILD},
        config::PlayerSettings,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const PREFIXES: [&str; 2] = ["/", "."];

    fn parse(content: &str) -> Option<MusicCommand> {
        MusicCommand::parse(content, &PREFIXES[..]).map(|(_, command)| command)
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(parse("/p never gonna"), Some(MusicCommand::Play("never gonna".into())));
        assert_eq!(parse(".PLAY  lofi  beats "), Some(MusicCommand::Play("lofi  beats".into())));
        assert_eq!(parse("/l"), Some(MusicCommand::Queue));
        assert_eq!(parse("/Q"), Some(MusicCommand::Queue));
        assert_eq!(parse(".c"), Some(MusicCommand::Clear));
        assert_eq!(parse("/s"), Some(MusicCommand::Skip));
        assert_eq!(parse("/skip_p"), Some(MusicCommand::SkipPlaylist));
        assert_eq!(parse("/resume"), Some(MusicCommand::Pause));
        assert_eq!(parse("/dc"), Some(MusicCommand::Leave));
        assert_eq!(parse("/kick"), Some(MusicCommand::Leave));
        assert_eq!(parse(".h"), Some(MusicCommand::Help));
    }

    #[test]
    fn test_parse_rejects_other_messages() {
        assert_eq!(parse("hola /play algo"), None);
        assert_eq!(parse("!play algo"), None);
        assert_eq!(parse("/volume 10"), None);
        assert_eq!(parse("/"), None);
    }

    #[test]
    fn test_parse_reports_prefix() {
        let parsed = MusicCommand::parse(".help", &PREFIXES[..]);
        assert_eq!(parsed, Some((".".to_string(), MusicCommand::Help)));
    }

    #[test]
    fn test_play_without_query() {
        assert_eq!(parse("/play"), Some(MusicCommand::Play(String::new())));
    }

    #[test]
    fn test_cooldown_per_user_and_command() {
        let cooldowns = Cooldowns::new();
        let alice = UserId::new(1);
        let bob = UserId::new(2);
        let start = Instant::now();

        assert!(cooldowns.check_at(alice, &MusicCommand::Queue, start).is_ok());
        let retry = cooldowns
            .check_at(alice, &MusicCommand::Queue, start + Duration::from_secs(2))
            .unwrap_err();
        assert_eq!(retry, Duration::from_secs(3));

        assert!(cooldowns.check_at(bob, &MusicCommand::Queue, start + Duration::from_secs(2)).is_ok());
        assert!(cooldowns.check_at(alice, &MusicCommand::Skip, start + Duration::from_secs(2)).is_ok());
        assert!(cooldowns.check_at(alice, &MusicCommand::Queue, start + Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_help_has_no_cooldown() {
        let cooldowns = Cooldowns::new();
        let user = UserId::new(1);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(cooldowns.check_at(user, &MusicCommand::Help, now).is_ok());
        }
    }

    fn registry(voice: &FakeVoice) -> PlayerRegistry {
        PlayerRegistry::new(
            Arc::new(FakeResolver::new().with_track("a", "A")),
            Arc::new(voice.clone()),
            PlayerSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_leave_drops_the_player() {
        let voice = FakeVoice::new();
        let registry = registry(&voice);
        let reply = RecordingNotifier::new();
        let inv = invocation(&reply);

        dispatch(&registry, GUILD, "/", MusicCommand::Play("a".into()), &inv)
            .await
            .unwrap();
        assert_eq!(registry.len(), 1);

        dispatch(&registry, GUILD, "/", MusicCommand::Leave, &inv)
            .await
            .unwrap();

        assert!(registry.is_empty());
        assert!(!voice.is_connected());
        assert_eq!(reply.last(), Some(Notice::Disconnected));
    }

    #[tokio::test]
    async fn test_empty_play_does_not_create_player() {
        let registry = registry(&FakeVoice::new());
        let reply = RecordingNotifier::new();

        dispatch(&registry, GUILD, "/", MusicCommand::Play(String::new()), &invocation(&reply))
            .await
            .unwrap();

        assert!(registry.is_empty());
        assert_eq!(reply.notices(), vec![Notice::Usage]);
    }

    #[tokio::test]
    async fn test_help_uses_settings() {
        let registry = registry(&FakeVoice::new());
        let reply = RecordingNotifier::new();

        dispatch(&registry, GUILD, ".", MusicCommand::Help, &invocation(&reply))
            .await
            .unwrap();

        assert_eq!(
            reply.notices(),
            vec![Notice::Help {
                prefix: ".".to_string(),
                max_tracks: 100,
                idle_timeout: Duration::from_secs(900),
            }]
        );
    }
}

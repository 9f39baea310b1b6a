use anyhow::{Context, Result};
use std::{path::PathBuf, str::FromStr, time::Duration};

/// Knobs of the per-guild player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSettings {
    /// Pistas que se piden primero al cargar una playlist para empezar a sonar cuanto antes
    pub track_window: usize,
    /// Máximo de pistas que se aceptan de una playlist
    pub max_playlist_tracks: usize,
    /// Tiempo sin actividad antes de salir del canal
    pub inactivity_timeout: Duration,
    /// Cada cuánto revisa el monitor de inactividad
    pub inactivity_poll_interval: Duration,
    /// Entradas por mensaje al mostrar la cola
    pub queue_page_size: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            track_window: 1,
            max_playlist_tracks: 100,
            inactivity_timeout: Duration::from_secs(15 * 60),
            inactivity_poll_interval: Duration::from_secs(60),
            queue_page_size: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefixes: Vec<String>,

    // Reproductor
    pub player: PlayerSettings,

    // yt-dlp
    pub ytdlp_path: PathBuf,
    pub ytdlp_cookies: Option<PathBuf>,
    pub resolver_concurrency: usize,

    // Logs
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Loads the configuration from the process environment (and `.env`).
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// Missing optional variables fall back to [`Config::default`]; present
    /// but unparsable ones are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let player = PlayerSettings {
            track_window: parse_or(&get, "TRACK_WINDOW", defaults.player.track_window)?,
            max_playlist_tracks: parse_or(
                &get,
                "MAX_PLAYLIST_TRACKS",
                defaults.player.max_playlist_tracks,
            )?,
            inactivity_timeout: duration_or(
                &get,
                "INACTIVITY_TIMEOUT",
                defaults.player.inactivity_timeout,
            )?,
            inactivity_poll_interval: duration_or(
                &get,
                "INACTIVITY_POLL_INTERVAL",
                defaults.player.inactivity_poll_interval,
            )?,
            queue_page_size: parse_or(&get, "QUEUE_PAGE_SIZE", defaults.player.queue_page_size)?,
        };

        Ok(Self {
            discord_token: get("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            command_prefixes: get("COMMAND_PREFIXES")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or(defaults.command_prefixes),
            player,
            ytdlp_path: get("YTDLP_PATH").map(PathBuf::from).unwrap_or(defaults.ytdlp_path),
            ytdlp_cookies: get("YTDLP_COOKIES").map(PathBuf::from),
            resolver_concurrency: parse_or(
                &get,
                "RESOLVER_CONCURRENCY",
                defaults.resolver_concurrency,
            )?,
            log_file: get("LOG_FILE").map(PathBuf::from),
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - The Discord token must not be empty
    /// - At least one command prefix must exist
    /// - Window, playlist cap and page size must be > 0, window ≤ cap
    /// - Inactivity timeout and poll interval must be > 0
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("Discord token must not be empty");
        }

        if self.command_prefixes.is_empty() {
            anyhow::bail!("At least one command prefix is required");
        }

        let player = &self.player;
        if player.track_window == 0 {
            anyhow::bail!("Track window must be greater than 0");
        }

        if player.max_playlist_tracks == 0 {
            anyhow::bail!("Max playlist tracks must be greater than 0");
        }

        if player.track_window > player.max_playlist_tracks {
            anyhow::bail!(
                "Track window ({}) cannot exceed max playlist tracks ({})",
                player.track_window,
                player.max_playlist_tracks
            );
        }

        if player.queue_page_size == 0 {
            anyhow::bail!("Queue page size must be greater than 0");
        }

        if player.inactivity_timeout.is_zero() || player.inactivity_poll_interval.is_zero() {
            anyhow::bail!("Inactivity timeout and poll interval must be greater than 0");
        }

        if self.resolver_concurrency == 0 {
            anyhow::bail!("Resolver concurrency must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Prefixes: {}\n  \
            Playlists: window {}, max {} tracks\n  \
            Inactivity: {} (poll every {})\n  \
            Queue pages: {} entries\n  \
            yt-dlp: {} (cookies: {}, concurrency {})",
            self.command_prefixes.join(" "),
            self.player.track_window,
            self.player.max_playlist_tracks,
            humantime::format_duration(self.player.inactivity_timeout),
            humantime::format_duration(self.player.inactivity_poll_interval),
            self.player.queue_page_size,
            self.ytdlp_path.display(),
            self.ytdlp_cookies
                .as_ref()
                .map_or("none".to_string(), |p| p.display().to_string()),
            self.resolver_concurrency,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin valor por defecto)
            discord_token: String::new(),
            command_prefixes: vec!["/".to_string(), ".".to_string()],

            player: PlayerSettings::default(),

            ytdlp_path: "yt-dlp".into(),
            ytdlp_cookies: None,
            resolver_concurrency: 3,

            log_file: None,
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} tiene un valor inválido: {}", key, raw)),
        None => Ok(default),
    }
}

fn duration_or<G>(get: &G, key: &str, default: Duration) -> Result<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => humantime::parse_duration(raw.trim())
            .with_context(|| format!("{} no es una duración válida: {}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[("DISCORD_TOKEN", "token")]).unwrap();

        assert_eq!(config.player, PlayerSettings::default());
        assert_eq!(config.player.track_window, 1);
        assert_eq!(config.player.max_playlist_tracks, 100);
        assert_eq!(config.player.inactivity_timeout, Duration::from_secs(900));
        assert_eq!(config.player.inactivity_poll_interval, Duration::from_secs(60));
        assert_eq!(config.player.queue_page_size, 30);
        assert_eq!(config.command_prefixes, vec!["/", "."]);
        config.validate().unwrap();
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("DISCORD_TOKEN", "token"),
            ("TRACK_WINDOW", "3"),
            ("MAX_PLAYLIST_TRACKS", "50"),
            ("INACTIVITY_TIMEOUT", "5m"),
            ("INACTIVITY_POLL_INTERVAL", "10s"),
            ("COMMAND_PREFIXES", "!, ?"),
            ("YTDLP_COOKIES", "/data/cookies.txt"),
        ])
        .unwrap();

        assert_eq!(config.player.track_window, 3);
        assert_eq!(config.player.max_playlist_tracks, 50);
        assert_eq!(config.player.inactivity_timeout, Duration::from_secs(300));
        assert_eq!(config.player.inactivity_poll_interval, Duration::from_secs(10));
        assert_eq!(config.command_prefixes, vec!["!", "?"]);
        assert_eq!(config.ytdlp_cookies, Some(PathBuf::from("/data/cookies.txt")));
    }

    #[test]
    fn test_missing_token_fails() {
        assert!(from_pairs(&[]).is_err());
    }

    #[test]
    fn test_invalid_values_fail() {
        assert!(from_pairs(&[("DISCORD_TOKEN", "t"), ("TRACK_WINDOW", "uno")]).is_err());
        assert!(from_pairs(&[("DISCORD_TOKEN", "t"), ("INACTIVITY_TIMEOUT", "soon")]).is_err());
    }

    #[test]
    fn test_validation_rules() {
        let mut config = from_pairs(&[("DISCORD_TOKEN", "token")]).unwrap();
        config.player.track_window = 200;
        assert!(config.validate().is_err());

        config.player.track_window = 1;
        config.player.queue_page_size = 0;
        assert!(config.validate().is_err());

        config.player.queue_page_size = 30;
        config.player.inactivity_poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_hides_token() {
        let config = from_pairs(&[("DISCORD_TOKEN", "super-secret")]).unwrap();
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("15m"));
    }
}

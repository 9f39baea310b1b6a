//! # Sources
//!
//! Track resolution for the player. The [`TrackResolver`] trait is the only
//! thing the player knows about; [`ytdlp::YtDlpResolver`] is the production
//! implementation backed by `yt-dlp`.

pub mod ytdlp;

use async_trait::async_trait;
use regex::Regex;
use std::{fmt, sync::OnceLock};
use url::Url;

use crate::error::ResolveError;

pub use ytdlp::YtDlpResolver;

/// Una pista resuelta y lista para reproducir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    source: String,
    title: String,
    playlist: Option<String>,
}

impl Track {
    pub fn new(source: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            playlist: None,
        }
    }

    /// Marca la pista como parte de una playlist
    pub fn in_playlist(mut self, playlist: impl Into<String>) -> Self {
        self.playlist = Some(playlist.into());
        self
    }

    /// URI reproducible (stream de audio directo)
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn playlist(&self) -> Option<&str> {
        self.playlist.as_deref()
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Result of a playlist lookup.
///
/// `unavailable` counts the entries the backend reported but could not
/// resolve; they are not part of `tracks`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistBatch {
    pub tracks: Vec<Track>,
    pub unavailable: usize,
}

impl PlaylistBatch {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            unavailable: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }
}

/// Asynchronous lookup of queries and URLs into playable tracks.
///
/// Implementations may be slow (network, subprocesses). `Ok(None)` means the
/// backend answered but found nothing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resuelve una búsqueda de texto libre o una URL a una sola pista
    async fn resolve_track(&self, query: &str) -> Result<Option<Track>, ResolveError>;

    /// Resuelve una playlist completa, truncada a `max_tracks`
    async fn resolve_playlist(
        &self,
        query: &str,
        max_tracks: usize,
    ) -> Result<Option<PlaylistBatch>, ResolveError>;

    /// Resuelve sólo las primeras `window` pistas de una playlist
    async fn resolve_playlist_window(
        &self,
        query: &str,
        window: usize,
    ) -> Result<Option<PlaylistBatch>, ResolveError>;
}

/// Returns the parsed URL when `query` is an http(s) link.
pub fn parse_http_url(query: &str) -> Option<Url> {
    let url = Url::parse(query.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Decide si la consulta apunta a una playlist (`?list=` / `&list=` o `/playlists/`).
pub fn is_playlist_query(query: &str) -> bool {
    static PLAYLIST_MARKER: OnceLock<Regex> = OnceLock::new();

    let Some(url) = parse_http_url(query) else {
        return false;
    };

    let marker = PLAYLIST_MARKER
        .get_or_init(|| Regex::new(r"(^|/)playlists/").expect("playlist regex is valid"));

    url.query_pairs().any(|(key, value)| key == "list" && !value.is_empty())
        || marker.is_match(url.path())
}

use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{parse_http_url, PlaylistBatch, Track, TrackResolver};
use crate::error::ResolveError;

/// Resolver que delega en `yt-dlp -J`
pub struct YtDlpResolver {
    binary: PathBuf,
    cookies: Option<PathBuf>,
    // Limitar procesos concurrentes para evitar rate limiting
    limiter: Semaphore,
}

/// Salida JSON de yt-dlp (video único, búsqueda o playlist)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    url: Option<String>,
    title: Option<String>,
    // Con --ignore-errors las entradas no disponibles llegan como null
    entries: Option<Vec<Option<YtDlpInfo>>>,
}

impl YtDlpInfo {
    fn into_track(self) -> Option<Track> {
        let source = self.url?;
        let title = self.title.unwrap_or_else(|| source.clone());
        Some(Track::new(source, title))
    }
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<PathBuf>, cookies: Option<PathBuf>, concurrency: usize) -> Self {
        Self {
            binary: binary.into(),
            cookies,
            limiter: Semaphore::new(concurrency.max(1)),
        }
    }

    async fn dump_json(
        &self,
        target: &str,
        extra: &[String],
    ) -> Result<Option<YtDlpInfo>, ResolveError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ResolveError::Closed)?;

        let mut command = Command::new(&self.binary);
        command.args([
            "-J",
            "--no-warnings",
            "--ignore-errors",
            "-f",
            "bestaudio/best",
        ]);
        if let Some(cookies) = &self.cookies {
            command.arg("--cookies").arg(cookies);
        }
        command.args(extra).arg(target);

        debug!("🔧 Ejecutando yt-dlp para: {}", target);
        let output = command.output().await?;

        // Con --ignore-errors yt-dlp puede salir con error y aun así imprimir JSON útil
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            if output.status.success() {
                return Ok(None);
            }
            return Err(ResolveError::Extractor {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if !output.status.success() {
            warn!(
                "⚠️ yt-dlp terminó con {} pero devolvió datos para: {}",
                output.status, target
            );
        }

        Ok(Some(serde_json::from_slice(&output.stdout)?))
    }
}

/// Extrae una sola pista de la salida de yt-dlp (video directo o primer resultado de búsqueda)
fn track_from_info(info: YtDlpInfo) -> Option<Track> {
    match info.entries {
        Some(entries) => entries.into_iter().flatten().find_map(YtDlpInfo::into_track),
        None => info.into_track(),
    }
}

/// Convierte la salida de una playlist en un lote, etiquetando cada pista con `playlist`
fn batch_from_info(info: YtDlpInfo, playlist: &str, limit: usize) -> Option<PlaylistBatch> {
    let entries = info.entries?;
    let mut batch = PlaylistBatch::default();

    for entry in entries.into_iter().take(limit) {
        match entry.and_then(YtDlpInfo::into_track) {
            Some(track) => batch.tracks.push(track.in_playlist(playlist)),
            None => batch.unavailable += 1,
        }
    }

    Some(batch)
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve_track(&self, query: &str) -> Result<Option<Track>, ResolveError> {
        let target = match parse_http_url(query) {
            Some(url) => url.to_string(),
            None => format!("ytsearch1:{}", query.trim()),
        };

        info!("🔍 Buscando pista: {}", query);
        let info = self
            .dump_json(&target, &["--no-playlist".to_string()])
            .await?;

        Ok(info.and_then(track_from_info))
    }

    async fn resolve_playlist(
        &self,
        query: &str,
        max_tracks: usize,
    ) -> Result<Option<PlaylistBatch>, ResolveError> {
        info!("📋 Obteniendo playlist (máx. {}): {}", max_tracks, query);
        let extra = [
            "--yes-playlist".to_string(),
            "--playlist-end".to_string(),
            max_tracks.to_string(),
        ];

        let info = self.dump_json(query, &extra).await?;
        Ok(info.and_then(|info| batch_from_info(info, query, max_tracks)))
    }

    async fn resolve_playlist_window(
        &self,
        query: &str,
        window: usize,
    ) -> Result<Option<PlaylistBatch>, ResolveError> {
        debug!("📋 Obteniendo primeras {} pistas de: {}", window, query);
        let extra = [
            "--yes-playlist".to_string(),
            "--playlist-end".to_string(),
            window.to_string(),
        ];

        let info = self.dump_json(query, &extra).await?;
        Ok(info.and_then(|info| batch_from_info(info, query, window)))
    }
}

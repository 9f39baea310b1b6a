use std::{fmt, time::Duration};

use crate::sources::Track;

/// Mensajes visibles para el usuario emitidos por el reproductor y los comandos
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Busy,
    Usage,
    NotInVoice,
    JoinFailed,
    NotFound,
    Added { title: String },
    PlaylistLoading,
    PlaylistInvalid,
    PlaylistAdded { count: usize },
    Unavailable { count: usize },
    PlaybackFailed { title: String },
    QueueEmpty,
    /// Un bloque de la cola; sólo el primero lleva cabecera
    QueuePage { first: bool, entries: Vec<String> },
    Cleared,
    Skipped,
    NoPlaylist,
    PlaylistSkipped,
    Paused,
    Resumed,
    Disconnected,
    IdleDisconnect,
    Cooldown { retry_after: Duration },
    Help {
        prefix: String,
        max_tracks: usize,
        idle_timeout: Duration,
    },
}

impl Notice {
    fn body(&self) -> String {
        match self {
            Notice::Busy => {
                "⏳ Comando no disponible mientras se carga una playlist. Por favor, espera..."
                    .to_string()
            }
            Notice::Usage => {
                "❌ Uso incorrecto. Sintaxis correcta: /play <palabras clave o URL>".to_string()
            }
            Notice::NotInVoice => "❌ ¡No estás en un canal de voz!".to_string(),
            Notice::JoinFailed => "❌ No se pudo conectar al canal de voz.".to_string(),
            Notice::NotFound => "🔍 No se encontró nada para tu búsqueda.".to_string(),
            Notice::Added { title } => format!("📥 Añadido {}", title),
            Notice::PlaylistLoading => {
                "♻️ Añadiendo playlist a la cola. Por favor, espera...".to_string()
            }
            Notice::PlaylistInvalid => "❌ Playlist inválida o vacía.".to_string(),
            Notice::PlaylistAdded { count } => {
                format!("📥 Añadidas {} pistas de la playlist a la cola.", count)
            }
            Notice::Unavailable { count } => {
                format!("⚠️ {} pista(s) no estaban disponibles y se omitieron.", count)
            }
            Notice::PlaybackFailed { title } => format!("❌ No se pudo reproducir {}", title),
            Notice::QueueEmpty => "📭 La cola está vacía.".to_string(),
            Notice::QueuePage { entries, .. } => entries.join("\n"),
            Notice::Cleared => "✨ Cola limpiada.".to_string(),
            Notice::Skipped => "⏭️ Saltada".to_string(),
            Notice::NoPlaylist => "⚠️ No hay ninguna playlist en curso.".to_string(),
            Notice::PlaylistSkipped => "⏭️ Playlist actual saltada.".to_string(),
            Notice::Paused => "⏸️ Pausa".to_string(),
            Notice::Resumed => "🔊 Reanudado".to_string(),
            Notice::Disconnected => "💔 Desconectado".to_string(),
            Notice::IdleDisconnect => "💤 Bot desconectado por inactividad.".to_string(),
            Notice::Cooldown { retry_after } => format!(
                "⏳ Espera {:.2} s antes de volver a usar el comando.",
                retry_after.as_secs_f64()
            ),
            Notice::Help {
                prefix,
                max_tracks,
                idle_timeout,
            } => format!(
                "Características del bot:\n\
                 El bot pone en cola las primeras {max_tracks} pistas de una playlist\n\
                 El bot sale del canal de voz tras {idle} de inactividad\n\
                 \n\
                 Comandos:\n\
                 {prefix}play <palabras clave || enlace> - reproduce una pista o playlist\n\
                 {prefix}skip - salta la pista actual\n\
                 {prefix}skipplaylist - quita de la cola las pistas de la playlist actual\n\
                 {prefix}pause - pausa la reproducción o la reanuda si ya estaba en pausa\n\
                 {prefix}queue | {prefix}list - muestra la cola actual\n\
                 {prefix}clear - limpia la cola\n\
                 {prefix}leave - desconecta el bot del canal de voz",
                idle = humantime::format_duration(*idle_timeout),
            ),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // La cooldown va como texto plano
            Notice::Cooldown { .. } => f.write_str(&self.body()),
            Notice::QueuePage { first: true, .. } => {
                write!(f, "**Cola actual:**\n```\n{}\n```", self.body())
            }
            _ => write!(f, "```\n{}\n```", self.body()),
        }
    }
}

/// Divide la cola en bloques de `page_size` entradas numeradas desde 1
pub fn queue_pages<'a>(tracks: impl IntoIterator<Item = &'a Track>, page_size: usize) -> Vec<Notice> {
    let entries: Vec<String> = tracks
        .into_iter()
        .enumerate()
        .map(|(i, track)| format!("{}) {}", i + 1, track))
        .collect();

    entries
        .chunks(page_size.max(1))
        .enumerate()
        .map(|(i, chunk)| Notice::QueuePage {
            first: i == 0,
            entries: chunk.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tracks(n: usize) -> Vec<Track> {
        (1..=n)
            .map(|i| Track::new(format!("https://cdn/{i}"), format!("Song {i}")))
            .collect()
    }

    #[test]
    fn test_queue_pages_sizes() {
        let pages = queue_pages(&tracks(65), 30);

        let sizes: Vec<(bool, usize)> = pages
            .iter()
            .map(|page| match page {
                Notice::QueuePage { first, entries } => (*first, entries.len()),
                other => panic!("unexpected notice {other:?}"),
            })
            .collect();

        assert_eq!(sizes, vec![(true, 30), (false, 30), (false, 5)]);
    }

    #[test]
    fn test_queue_pages_numbering_continues() {
        let pages = queue_pages(&tracks(31), 30);
        assert_eq!(
            pages[1],
            Notice::QueuePage {
                first: false,
                entries: vec!["31) Song 31".to_string()],
            }
        );
    }

    #[test]
    fn test_first_page_has_header() {
        let pages = queue_pages(&tracks(2), 30);
        assert_eq!(
            pages[0].to_string(),
            "**Cola actual:**\n```\n1) Song 1\n2) Song 2\n```"
        );
    }

    #[test]
    fn test_empty_queue_has_no_pages() {
        assert!(queue_pages(&tracks(0), 30).is_empty());
    }

    #[test]
    fn test_help_mentions_limits() {
        let help = Notice::Help {
            prefix: "/".to_string(),
            max_tracks: 100,
            idle_timeout: Duration::from_secs(15 * 60),
        }
        .to_string();

        assert!(help.contains("primeras 100 pistas"));
        assert!(help.contains("15m"));
        assert!(help.contains("/skipplaylist"));
    }
}

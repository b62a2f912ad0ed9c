use async_trait::async_trait;
use songbird::input::Input;
use std::{fmt, sync::Arc, time::Duration};

use crate::error::PlaybackError;

/// Tipo de track. Solo existen videos de YouTube por ahora.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    YoutubeVideo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub url: String,
}

/// Capacidad perezosa de obtener el audio de un track.
///
/// Se invoca una sola vez, cuando el track llega a la cabeza de la cola.
/// `Ok(None)` significa que el recurso existe pero no ofrece audio.
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn resolve_stream(&self) -> Result<Option<Input>, PlaybackError>;
}

/// Descriptor inmutable de un elemento reproducible
#[derive(Clone)]
pub struct Track {
    pub kind: TrackKind,
    pub author: Author,
    pub title: String,
    pub url: String,
    pub thumbnail: Option<String>,
    pub playback_time: Duration,
    source: Arc<dyn StreamSource>,
}

impl Track {
    pub fn new(
        kind: TrackKind,
        author: Author,
        title: String,
        url: String,
        playback_time: Duration,
        source: Arc<dyn StreamSource>,
    ) -> Self {
        Self {
            kind,
            author,
            title,
            url,
            thumbnail: None,
            playback_time,
            source,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: Option<String>) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    /// Obtiene el stream de audio (puede tardar: toca la red)
    pub async fn resolve_stream(&self) -> Result<Option<Input>, PlaybackError> {
        self.source.resolve_stream().await
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("kind", &self.kind)
            .field("title", &self.title)
            .field("url", &self.url)
            .field("playback_time", &self.playback_time)
            .finish_non_exhaustive()
    }
}

/// Suma la duración de una lista de tracks
pub fn total_playback_time<'a>(tracks: impl IntoIterator<Item = &'a Track>) -> Duration {
    tracks.into_iter().map(|t| t.playback_time).sum()
}

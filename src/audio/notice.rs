use serenity::model::id::GuildId;
use std::time::Duration;

use crate::audio::track::Track;

/// Motivo por el que un resolver rechazó una clave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotTargetReason {
    MalformedUrl,
    NonAcceptableUrlProtocol,
    NoMatch,
    VideoIdNotIncluded,
    PlaylistIdNotIncluded,
    NotPlaylistUrlOrPlaybackUrl,
    FailedToGetHandle,
    FailedToFetchMetadata,
    EmptyPlaylist,
}

impl NotTargetReason {
    pub fn code(self) -> &'static str {
        match self {
            NotTargetReason::MalformedUrl => "MALFORMED_URL",
            NotTargetReason::NonAcceptableUrlProtocol => "NON_ACCEPTABLE_URL_PROTOCOL",
            NotTargetReason::NoMatch => "NO_MATCH",
            NotTargetReason::VideoIdNotIncluded => "VIDEO_ID_NOT_INCLUDED",
            NotTargetReason::PlaylistIdNotIncluded => "PLAYLIST_ID_NOT_INCLUDED",
            NotTargetReason::NotPlaylistUrlOrPlaybackUrl => "NOT_PLAYLIST_URL_OR_PLAYBACK_URL",
            NotTargetReason::FailedToGetHandle => "FAILED_TO_GET_HANDLE",
            NotTargetReason::FailedToFetchMetadata => "FAILED_TO_FETCH_METADATA",
            NotTargetReason::EmptyPlaylist => "EMPTY_PLAYLIST",
        }
    }
}

/// Una página de la cola, numerada desde 1
#[derive(Debug, Clone)]
pub struct QueuePage {
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub tracks: Vec<Track>,
    /// Cola completa más lo que le queda al track actual
    pub total_time: Duration,
}

/// Resultado de un comando, listo para que la capa de UI lo muestre.
///
/// El servicio nunca formatea texto: devuelve estos valores y `ui::embeds`
/// decide cómo se ven.
#[derive(Debug, Clone)]
pub enum Notice {
    NotTarget {
        key: String,
        reason: NotTargetReason,
    },
    TrackQueued {
        track: Track,
        /// Posición 1-based dentro de la cola
        position: usize,
        track_time: Duration,
        /// Tiempo hasta que termine este track
        total_time: Duration,
    },
    PlaylistQueued {
        title: String,
        thumbnail: Option<String>,
        count: usize,
        /// Largo de la cola tras agregar la playlist
        total: usize,
        added_time: Duration,
        total_time: Duration,
    },
    ConnectVoiceChannelFirst,
    MissingArgument,
    MissingViewChannelPermission,
    MissingConnectPermission,
    VoiceChannelFull,
    ConnectFailed,
    Disconnected,
    QueueShuffled,
    QueueCleared,
    TrackSkipped,
    NothingPlaying,
    InvalidPage,
    PageEmpty,
    Queue(QueuePage),
    NowPlaying {
        track: Track,
        elapsed: Duration,
    },
}

/// Eventos de reproducción de todas las sesiones.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    Started { guild_id: GuildId, track: Track },
    Finished { guild_id: GuildId, track: Track },
    Error { guild_id: GuildId, message: String },
    Destroyed { guild_id: GuildId },
}

use serenity::builder::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter, CreateMessage};
use std::time::Duration;

use crate::audio::{
    notice::{NotTargetReason, Notice, QueuePage},
    track::Track,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Mensaje listo para enviar
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub content: Option<String>,
    pub embeds: Vec<CreateEmbed>,
}

impl Reply {
    fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embeds: Vec::new(),
        }
    }

    fn embed(embed: CreateEmbed) -> Self {
        Self {
            content: None,
            embeds: vec![embed],
        }
    }

    pub fn into_message(self) -> CreateMessage {
        let mut message = CreateMessage::new().embeds(self.embeds);
        if let Some(content) = self.content {
            message = message.content(content);
        }
        message
    }
}

/// Formatea una duración como `H:MM:SS`, o `MM:SS` si no llega a una hora
pub fn format_playback_time(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Embed de un track; con `elapsed` el pie muestra el avance
pub fn track_embed(track: &Track, elapsed: Option<Duration>) -> CreateEmbed {
    let total = format_playback_time(track.playback_time);
    let footer = match elapsed {
        Some(elapsed) => format!("{} / {}", format_playback_time(elapsed), total),
        None => total,
    };

    let mut author = CreateEmbedAuthor::new(track.author.name.as_str());
    if !track.author.url.is_empty() {
        author = author.url(track.author.url.as_str());
    }

    let mut embed = CreateEmbed::default()
        .title(track.title.as_str())
        .url(track.url.as_str())
        .author(author)
        .color(colors::MUSIC_PURPLE)
        .footer(CreateEmbedFooter::new(footer));

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }
    embed
}

/// Embed para el anuncio de "Reproduciendo ahora"
pub fn now_playing_embed(track: &Track) -> CreateEmbed {
    track_embed(track, None).description("🎵 Reproduciendo ahora")
}

fn error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
}

fn not_target_description(reason: NotTargetReason) -> &'static str {
    match reason {
        NotTargetReason::MalformedUrl => "No es una URL válida.",
        NotTargetReason::NonAcceptableUrlProtocol => "Solo se aceptan URLs https.",
        NotTargetReason::NoMatch => "Solo se aceptan URLs de youtube.com.",
        NotTargetReason::VideoIdNotIncluded => "La URL no incluye el id del video (`v=`).",
        NotTargetReason::PlaylistIdNotIncluded => "La URL no incluye el id de la playlist (`list=`).",
        NotTargetReason::NotPlaylistUrlOrPlaybackUrl => {
            "La URL no es de un video ni de una playlist."
        }
        NotTargetReason::FailedToGetHandle => "El id no tiene un formato válido.",
        NotTargetReason::FailedToFetchMetadata => "No se pudo obtener la información.",
        NotTargetReason::EmptyPlaylist => "La playlist está vacía.",
    }
}

fn queue_reply(page: &QueuePage) -> Reply {
    Reply {
        content: Some(format!(
            "📋 Página {}/{} ({} en cola)\n⏱️ Tiempo total: `{}`",
            page.page,
            page.total_pages,
            page.total_items,
            format_playback_time(page.total_time)
        )),
        embeds: page.tracks.iter().map(|t| track_embed(t, None)).collect(),
    }
}

/// Traduce un [`Notice`] al mensaje que ve el usuario.
pub fn render(notice: &Notice) -> Reply {
    match notice {
        Notice::NotTarget { key, reason } => Reply::embed(
            error_embed("No se puede reproducir", not_target_description(*reason))
                .field("Entrada", format!("`{}`", key), false)
                .footer(CreateEmbedFooter::new(reason.code())),
        ),
        Notice::TrackQueued {
            track,
            position,
            track_time,
            total_time,
        } => Reply::embed(
            track_embed(track, None)
                .description("➕ Agregado a la cola")
                .field("Posición", position.to_string(), true)
                .field("Duración", format_playback_time(*track_time), true)
                .field("Tiempo hasta terminar", format_playback_time(*total_time), true)
                .color(colors::SUCCESS_GREEN),
        ),
        Notice::PlaylistQueued {
            title,
            thumbnail,
            count,
            total,
            added_time,
            total_time,
        } => {
            let mut embed = CreateEmbed::default()
                .title(format!("📋 {}", title))
                .description(format!("➕ {} canciones agregadas a la cola", count))
                .field("En cola", total.to_string(), true)
                .field("Duración", format_playback_time(*added_time), true)
                .field("Tiempo hasta terminar", format_playback_time(*total_time), true)
                .color(colors::SUCCESS_GREEN);
            if let Some(thumbnail) = thumbnail {
                embed = embed.thumbnail(thumbnail);
            }
            Reply::embed(embed)
        }
        Notice::ConnectVoiceChannelFirst => Reply::embed(error_embed(
            "Sin canal de voz",
            "Conéctate a un canal de voz primero.",
        )),
        Notice::MissingArgument => Reply::embed(error_embed(
            "Falta el argumento",
            "Indica la URL de un video o playlist de YouTube.",
        )),
        Notice::MissingViewChannelPermission => Reply::embed(error_embed(
            "Sin permisos",
            "No tengo permiso para ver ese canal de voz.",
        )),
        Notice::MissingConnectPermission => Reply::embed(error_embed(
            "Sin permisos",
            "No tengo permiso para conectarme a ese canal de voz.",
        )),
        Notice::VoiceChannelFull => Reply::embed(error_embed(
            "Canal lleno",
            "El canal de voz está lleno.",
        )),
        Notice::ConnectFailed => Reply::embed(error_embed(
            "Error de conexión",
            "No se pudo conectar al canal de voz.",
        )),
        Notice::Disconnected => Reply::text("👋 Desconectado del canal de voz"),
        Notice::QueueShuffled => Reply::text("🔀 Cola mezclada"),
        Notice::QueueCleared => Reply::text("🗑️ Cola limpiada"),
        Notice::TrackSkipped => Reply::text("⏭️ Canción saltada"),
        Notice::NothingPlaying => Reply::embed(
            CreateEmbed::default()
                .title("ℹ️ Nada en reproducción")
                .color(colors::INFO_BLUE),
        ),
        Notice::InvalidPage => Reply::embed(error_embed(
            "Página inválida",
            "La página debe ser un número entero mayor que 0.",
        )),
        Notice::PageEmpty => Reply::embed(
            CreateEmbed::default()
                .title("📭 Página vacía")
                .color(colors::WARNING_ORANGE),
        ),
        Notice::Queue(page) => queue_reply(page),
        Notice::NowPlaying { track, elapsed } => Reply::embed(track_embed(track, Some(*elapsed))),
    }
}

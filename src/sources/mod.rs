pub mod youtube;

use async_trait::async_trait;
use serenity::model::id::GuildId;
use std::{sync::Arc, time::Duration};

use crate::audio::{
    notice::{NotTargetReason, Notice},
    queue::MusicQueue,
    track::{total_playback_time, Track},
};

pub use youtube::YouTubeResolver;

/// Vista de solo lectura de la cola del guild que está resolviendo.
///
/// Los resolvers la usan para calcular posiciones y tiempos de espera en sus
/// avisos; no pueden modificar la cola.
pub struct ResolveContext {
    guild_id: GuildId,
    queue: Arc<MusicQueue>,
    current_remaining: Duration,
}

impl ResolveContext {
    pub fn new(guild_id: GuildId, queue: Arc<MusicQueue>, current_remaining: Duration) -> Self {
        Self {
            guild_id,
            queue,
            current_remaining,
        }
    }

    pub fn queued_tracks(&self) -> Vec<Track> {
        self.queue.snapshot(self.guild_id)
    }

    /// Duración total de lo que ya está en cola
    pub fn queued_time(&self) -> Duration {
        total_playback_time(&self.queued_tracks())
    }

    /// Lo que le queda al track en reproducción (cero si no hay)
    pub fn current_remaining(&self) -> Duration {
        self.current_remaining
    }
}

/// Tracks resueltos más los avisos para el usuario.
#[derive(Debug, Default)]
pub struct Resolution {
    pub tracks: Vec<Track>,
    pub notices: Vec<Notice>,
}

impl Resolution {
    /// La clave no corresponde a nada que este resolver sepa reproducir
    pub fn rejected(key: &str, reason: NotTargetReason) -> Self {
        Self {
            tracks: Vec::new(),
            notices: vec![Notice::NotTarget {
                key: key.to_string(),
                reason,
            }],
        }
    }
}

/// Convierte una clave escrita por el usuario en tracks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, key: &str, ctx: &ResolveContext) -> Resolution;
}

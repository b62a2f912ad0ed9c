use dashmap::{mapref::entry::Entry, DashMap};
use rand::seq::SliceRandom;
use serenity::model::id::GuildId;
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::audio::track::Track;

/// Colas FIFO en memoria, una por guild.
///
/// Un guild sin canciones no tiene entrada en el mapa: la ausencia equivale a
/// una cola vacía, así los guilds inactivos no ocupan memoria.
///
/// Cada operación es atómica por sí sola; decidir *qué* hacer con la cola
/// (drenar, saltar) lo serializa la capa superior.
#[derive(Debug, Default)]
pub struct MusicQueue {
    tracks: DashMap<GuildId, VecDeque<Track>>,
}

impl MusicQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega tracks al final de la cola
    pub fn push(&self, guild_id: GuildId, tracks: Vec<Track>) {
        if tracks.is_empty() {
            return;
        }
        let added = tracks.len();
        let mut queue = self.tracks.entry(guild_id).or_default();
        queue.extend(tracks);
        debug!("➕ {} tracks agregados en guild {} (total {})", added, guild_id, queue.len());
    }

    /// Saca la cabeza de la cola; borra la entrada si queda vacía
    pub fn pop(&self, guild_id: GuildId) -> Option<Track> {
        match self.tracks.entry(guild_id) {
            Entry::Occupied(mut entry) => {
                let track = entry.get_mut().pop_front();
                if entry.get().is_empty() {
                    entry.remove();
                }
                track
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Copia de `[start, end)` sin modificar la cola. Los límites fuera de
    /// rango se recortan.
    pub fn get(&self, guild_id: GuildId, start: usize, end: Option<usize>) -> Vec<Track> {
        let Some(queue) = self.tracks.get(&guild_id) else {
            return Vec::new();
        };
        let len = queue.len();
        let end = end.unwrap_or(len).min(len);
        let start = start.min(end);
        queue.range(start..end).cloned().collect()
    }

    /// Toda la cola del guild
    pub fn snapshot(&self, guild_id: GuildId) -> Vec<Track> {
        self.get(guild_id, 0, None)
    }

    pub fn clear(&self, guild_id: GuildId) {
        if let Some((_, removed)) = self.tracks.remove(&guild_id) {
            info!("🗑️ Cola limpiada en guild {}: {} tracks removidos", guild_id, removed.len());
        }
    }

    /// Mezcla la cola (Fisher–Yates); no hace nada si no existe
    pub fn shuffle(&self, guild_id: GuildId) {
        if let Some(mut queue) = self.tracks.get_mut(&guild_id) {
            queue.make_contiguous().shuffle(&mut rand::thread_rng());
            info!("🔀 Cola mezclada en guild {}", guild_id);
        }
    }

    pub fn len(&self, guild_id: GuildId) -> usize {
        self.tracks.get(&guild_id).map_or(0, |q| q.len())
    }

    #[cfg(test)]
    fn contains_guild(&self, guild_id: GuildId) -> bool {
        self.tracks.contains_key(&guild_id)
    }
}

use std::collections::VecDeque;

use rand::Rng;
use serenity::model::id::GuildId;
use thiserror::Error;
use tracing::{debug, info};

use crate::audio::track::Track;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("la cola está llena (máximo {0} canciones)")]
    Full(usize),
}

/// Cola de reproducción de una guild.
///
/// Propiedad exclusiva de un `GuildPlayer`; el slot `current` lo escribe
/// solo el player, inmediatamente antes de entregar un stream al
/// transporte.
#[derive(Debug)]
pub struct MusicQueue {
    guild_id: GuildId,
    tracks: VecDeque<Track>,
    current: Option<Track>,
    loop_mode: bool,
    shuffle_mode: bool,
    max_size: usize,
}

/// Vista de solo lectura de la cola, para mostrar al usuario.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub length: usize,
    pub current: Option<String>,
    pub next: Option<String>,
    pub loop_mode: bool,
    pub shuffle_mode: bool,
}

impl MusicQueue {
    pub fn new(guild_id: GuildId, max_size: usize) -> Self {
        Self {
            guild_id,
            tracks: VecDeque::new(),
            current: None,
            loop_mode: false,
            shuffle_mode: false,
            max_size,
        }
    }

    /// Agrega un track y devuelve su posición (1-based).
    pub fn add_track(&mut self, track: Track) -> Result<usize, QueueError> {
        if self.tracks.len() >= self.max_size {
            return Err(QueueError::Full(self.max_size));
        }

        info!("➕ Agregado a la cola: {}", track);
        self.tracks.push_back(track);
        Ok(self.tracks.len())
    }

    /// Agrega tantos tracks como quepan, en orden, y devuelve cuántos
    /// entraron. Quedarse sin espacio no es un error: el caller se entera
    /// por el conteo.
    pub fn add_tracks(&mut self, tracks: Vec<Track>) -> usize {
        let available = self.max_size.saturating_sub(self.tracks.len());
        let to_add = tracks.len().min(available);

        for track in tracks.into_iter().take(to_add) {
            self.tracks.push_back(track);
        }

        info!(
            "➕ Agregadas {} canciones a la cola de guild {}",
            to_add, self.guild_id
        );
        to_add
    }

    /// Saca el próximo track: FIFO estricto, o un elemento uniformemente
    /// aleatorio en modo shuffle. Única operación de dequeue que muta la
    /// cola; a lo sumo una llamada por avance de reproducción.
    pub fn get_next_track(&mut self) -> Option<Track> {
        if self.tracks.is_empty() {
            debug!("📭 Cola vacía para guild {}", self.guild_id);
            return None;
        }

        if self.shuffle_mode {
            let index = rand::thread_rng().gen_range(0..self.tracks.len());
            let selected = self.tracks.remove(index);
            if let Some(track) = &selected {
                info!("🔀 Seleccionado aleatoriamente: {}", track);
            }
            selected
        } else {
            let next = self.tracks.pop_front();
            if let Some(track) = &next {
                info!("➡️ Siguiente en cola (FIFO): {}", track);
            }
            next
        }
    }

    /// Mira el frente sin sacarlo. Siempre el índice 0, incluso en modo
    /// shuffle: "próximo" en pantalla es la cabeza FIFO, no el sorteo que
    /// hará `get_next_track`.
    pub fn peek_next(&self) -> Option<&Track> {
        self.tracks.front()
    }

    /// Vacía la cola y devuelve cuántos tracks había.
    pub fn clear(&mut self) -> usize {
        let count = self.tracks.len();
        self.tracks.clear();
        info!("🗑️ Cola limpiada ({} tracks) en guild {}", count, self.guild_id);
        count
    }

    /// Elimina el track en la posición dada (0-based).
    #[allow(dead_code)]
    pub fn remove_track(&mut self, index: usize) -> Option<Track> {
        self.tracks.remove(index)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn set_current(&mut self, track: Track) {
        self.current = Some(track);
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle_mode = !self.shuffle_mode;
        if self.shuffle_mode {
            info!("🔀 Modo aleatorio activado en guild {}", self.guild_id);
        } else {
            info!("➡️ Modo aleatorio desactivado en guild {}", self.guild_id);
        }
        self.shuffle_mode
    }

    #[allow(dead_code)]
    pub fn toggle_loop(&mut self) -> bool {
        self.loop_mode = !self.loop_mode;
        self.loop_mode
    }

    /// Los próximos `limit` tracks, ya formateados para mostrar.
    pub fn upcoming(&self, limit: usize) -> Vec<String> {
        self.tracks.iter().take(limit).map(|track| track.to_string()).collect()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            length: self.tracks.len(),
            current: self.current.as_ref().map(|track| track.to_string()),
            next: self.tracks.front().map(|track| track.to_string()),
            loop_mode: self.loop_mode,
            shuffle_mode: self.shuffle_mode,
        }
    }
}

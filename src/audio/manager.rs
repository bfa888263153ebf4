use std::sync::Arc;

use dashmap::DashMap;
use serenity::model::id::GuildId;
use tracing::info;

use crate::{
    audio::{
        player::{GuildPlayer, PlayerNotifier},
        transport::VoiceGateway,
    },
    config::Config,
    sources::StreamResolver,
};

/// Registro de players por guild, con creación perezosa.
///
/// Los servicios (resolver, gateway de voz, notifier) se inyectan una sola
/// vez acá y viajan a cada player nuevo; no hay singletons de proceso.
pub struct PlayerManager {
    players: DashMap<GuildId, Arc<GuildPlayer>>,
    resolver: Arc<dyn StreamResolver>,
    gateway: Arc<dyn VoiceGateway>,
    notifier: Arc<dyn PlayerNotifier>,
    max_queue_size: usize,
    max_consecutive_skips: usize,
}

impl PlayerManager {
    pub fn new(
        config: &Config,
        resolver: Arc<dyn StreamResolver>,
        gateway: Arc<dyn VoiceGateway>,
        notifier: Arc<dyn PlayerNotifier>,
    ) -> Self {
        Self {
            players: DashMap::new(),
            resolver,
            gateway,
            notifier,
            max_queue_size: config.max_queue_size,
            max_consecutive_skips: config.max_consecutive_skips,
        }
    }

    /// Devuelve el player de la guild, creándolo si no existe. La carrera
    /// de creación perezosa se resuelve con un único insert-if-absent.
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildPlayer> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                info!("🆕 Creando player para guild {}", guild_id);
                GuildPlayer::new(
                    guild_id,
                    self.max_queue_size,
                    self.max_consecutive_skips,
                    self.resolver.clone(),
                    self.gateway.clone(),
                    self.notifier.clone(),
                )
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer>> {
        self.players.get(&guild_id).map(|entry| entry.clone())
    }

    /// Desconecta y descarta el player de la guild.
    pub async fn remove(&self, guild_id: GuildId) -> bool {
        if let Some((_, player)) = self.players.remove(&guild_id) {
            player.disconnect().await;
            info!("🗑️ Player de guild {} descartado", guild_id);
            true
        } else {
            false
        }
    }

    /// Desconecta todos los players registrados; se usa al apagar.
    pub async fn cleanup_all(&self) {
        let players: Vec<_> = self.players.iter().map(|entry| entry.value().clone()).collect();
        self.players.clear();

        for player in players {
            player.disconnect().await;
        }

        info!("🧹 Todos los players desconectados");
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }
}

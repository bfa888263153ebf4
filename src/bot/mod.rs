//! Adaptador de Discord: registro y despacho de comandos, ciclo de vida
//! del proceso y anuncios hacia los canales de texto.
//!
//! Toda la lógica de reproducción vive en [`crate::audio`]; acá solo se
//! traducen interacciones a llamadas sobre el [`PlayerManager`] y estados
//! del player a mensajes.

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serenity::{
    all::{Context, EventHandler, Interaction, Ready, VoiceState},
    builder::CreateMessage,
    model::id::{ChannelId, GuildId},
};
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{
        player::PlayerNotifier, track::Track, transport::SongbirdGateway, PlayerManager,
    },
    config::Config,
    sources::{Catalog, SpotifyCatalog, StreamResolver, YtDlpResolver},
    ui::embeds,
};

/// Servicios que recién existen cuando el gateway está listo (necesitan el
/// contexto de Discord).
struct Runtime {
    manager: Arc<PlayerManager>,
    notifier: Arc<ChannelNotifier>,
}

/// Handler principal del bot.
pub struct MixtapeBot {
    config: Arc<Config>,
    pub catalog: Arc<dyn Catalog>,
    pub resolver: Arc<dyn StreamResolver>,
    runtime: OnceLock<Runtime>,
}

impl MixtapeBot {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let catalog: Arc<dyn Catalog> = Arc::new(SpotifyCatalog::new(&config));
        let resolver: Arc<dyn StreamResolver> =
            Arc::new(YtDlpResolver::new(config.resolve_timeout_secs));

        Self {
            config,
            catalog,
            resolver,
            runtime: OnceLock::new(),
        }
    }

    pub fn manager(&self) -> Result<Arc<PlayerManager>> {
        self.runtime
            .get()
            .map(|runtime| runtime.manager.clone())
            .ok_or_else(|| anyhow::anyhow!("El bot todavía no terminó de inicializar"))
    }

    pub fn notifier(&self) -> Result<Arc<ChannelNotifier>> {
        self.runtime
            .get()
            .map(|runtime| runtime.notifier.clone())
            .ok_or_else(|| anyhow::anyhow!("El bot todavía no terminó de inicializar"))
    }

    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for MixtapeBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }

        if self.runtime.get().is_some() {
            // Reconexión del gateway; los servicios ya existen
            return;
        }

        let Some(songbird) = songbird::get(&ctx).await else {
            error!("❌ Songbird no inicializado");
            return;
        };

        let gateway = Arc::new(SongbirdGateway::new(songbird, self.config.default_volume));
        let notifier = Arc::new(ChannelNotifier::new(ctx.http.clone()));
        let manager = Arc::new(PlayerManager::new(
            &self.config,
            self.resolver.clone(),
            gateway,
            notifier.clone(),
        ));

        if self.runtime.set(Runtime { manager: manager.clone(), notifier }).is_err() {
            return;
        }

        // Shutdown ordenado: desconectar todos los players antes de salir
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("⚠️ Señal de shutdown recibida, cerrando...");
                manager.cleanup_all().await;
                std::process::exit(0);
            }
        });

        tokio::spawn(maintenance_tasks());

        info!("🚀 Bot listo para reproducir música");
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Si alguien echa al bot del canal de voz, el player de esa guild se
    /// descarta para no dejar estado colgado.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;

        if new.user_id == current_user_id && old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                info!("🔌 Bot desconectado del canal de voz en guild {}", guild_id);
                if let Ok(manager) = self.manager() {
                    manager.remove(guild_id).await;
                }
            }
        }
    }
}

/// Envía los anuncios del player al último canal de texto desde el que se
/// comandó cada guild. Best-effort: un envío fallido solo se loguea.
pub struct ChannelNotifier {
    http: Arc<serenity::http::Http>,
    channels: DashMap<GuildId, ChannelId>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<serenity::http::Http>) -> Self {
        Self {
            http,
            channels: DashMap::new(),
        }
    }

    /// Asocia los anuncios de una guild al canal dado.
    pub fn bind(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.channels.insert(guild_id, channel_id);
    }

    fn channel_for(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.channels.get(&guild_id).map(|entry| *entry)
    }
}

#[async_trait]
impl PlayerNotifier for ChannelNotifier {
    async fn now_playing(&self, guild_id: GuildId, track: &Track) {
        let Some(channel_id) = self.channel_for(guild_id) else {
            debug!("Sin canal de anuncios para guild {}", guild_id);
            return;
        };

        let embed = embeds::create_now_playing_embed(track);
        if let Err(e) = channel_id
            .send_message(&self.http, CreateMessage::new().embed(embed))
            .await
        {
            warn!("No se pudo anunciar now playing en guild {}: {:?}", guild_id, e);
        }
    }

    async fn tracks_appended(&self, guild_id: GuildId, collection: &str, added: usize) {
        let Some(channel_id) = self.channel_for(guild_id) else {
            return;
        };

        let embed = embeds::create_tracks_appended_embed(collection, added);
        if let Err(e) = channel_id
            .send_message(&self.http, CreateMessage::new().embed(embed))
            .await
        {
            warn!("No se pudo anunciar carga de colección en guild {}: {:?}", guild_id, e);
        }
    }
}

/// Mantenimiento periódico: verifica que yt-dlp siga operativo.
async fn maintenance_tasks() {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));

    loop {
        interval.tick().await;

        match YtDlpResolver::verify_available().await {
            Ok(version) => debug!("🧹 yt-dlp operativo (versión {})", version),
            Err(e) => warn!("⚠️ yt-dlp no disponible: {}", e),
        }
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use thiserror::Error;
use tracing::{error, info};

use crate::sources::PlaybackSource;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no se pudo unir al canal de voz: {0}")]
    Join(String),

    #[error("fallo del transporte de audio: {0}")]
    Playback(String),
}

/// Receptor del fin de pista. El transporte lo invoca tanto en el final
/// natural como tras un stop explícito; el motivo lo lleva el player.
#[async_trait]
pub trait TrackEndSink: Send + Sync {
    async fn track_ended(&self, errored: bool);
}

/// Conexión de voz activa de una guild.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    async fn play(
        &self,
        source: PlaybackSource,
        on_end: Arc<dyn TrackEndSink>,
    ) -> Result<(), TransportError>;

    async fn pause(&self) -> bool;

    async fn resume(&self) -> bool;

    async fn stop(&self);

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;

    async fn disconnect(&self);
}

/// Punto de entrada al transporte de voz: une el bot a un canal y entrega
/// la conexión. Inyectado en el manager para poder simularlo en tests.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, TransportError>;
}

/// Implementación del gateway sobre Songbird.
pub struct SongbirdGateway {
    songbird: Arc<Songbird>,
    http: reqwest::Client,
    default_volume: f32,
}

impl SongbirdGateway {
    pub fn new(songbird: Arc<Songbird>, default_volume: f32) -> Self {
        Self {
            songbird,
            http: reqwest::Client::new(),
            default_volume,
        }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, TransportError> {
        let call = self
            .songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| {
                error!("Error al obtener handler de voz: {:?}", e);
                TransportError::Join(e.to_string())
            })?;

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);

        Ok(Arc::new(SongbirdConnection {
            call,
            channel_id,
            current: parking_lot::Mutex::new(None),
            http: self.http.clone(),
            default_volume: self.default_volume,
        }))
    }
}

struct SongbirdConnection {
    call: Arc<tokio::sync::Mutex<Call>>,
    channel_id: ChannelId,
    current: parking_lot::Mutex<Option<TrackHandle>>,
    http: reqwest::Client,
    default_volume: f32,
}

impl SongbirdConnection {
    fn current_handle(&self) -> Option<TrackHandle> {
        self.current.lock().clone()
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn play(
        &self,
        source: PlaybackSource,
        on_end: Arc<dyn TrackEndSink>,
    ) -> Result<(), TransportError> {
        let input = Input::from(HttpRequest::new(self.http.clone(), source.stream_url));

        let handle = {
            let mut call = self.call.lock().await;
            call.play_input(input)
        };

        let _ = handle.set_volume(self.default_volume);

        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndRelay {
                    sink: on_end.clone(),
                    errored: false,
                },
            )
            .map_err(|e| TransportError::Playback(e.to_string()))?;

        handle
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackEndRelay {
                    sink: on_end,
                    errored: true,
                },
            )
            .map_err(|e| TransportError::Playback(e.to_string()))?;

        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn pause(&self) -> bool {
        match self.current_handle() {
            Some(handle) => handle.pause().is_ok(),
            None => false,
        }
    }

    async fn resume(&self) -> bool {
        match self.current_handle() {
            Some(handle) => handle.play().is_ok(),
            None => false,
        }
    }

    async fn stop(&self) {
        if let Some(handle) = self.current_handle() {
            let _ = handle.stop();
        }
    }

    async fn is_playing(&self) -> bool {
        match self.current_handle() {
            Some(handle) => matches!(
                handle.get_info().await.map(|info| info.playing),
                Ok(PlayMode::Play)
            ),
            None => false,
        }
    }

    async fn is_paused(&self) -> bool {
        match self.current_handle() {
            Some(handle) => matches!(
                handle.get_info().await.map(|info| info.playing),
                Ok(PlayMode::Pause)
            ),
            None => false,
        }
    }

    async fn disconnect(&self) {
        self.stop().await;
        self.current.lock().take();

        let mut call = self.call.lock().await;
        if let Err(e) = call.leave().await {
            error!("Error al salir del canal de voz: {:?}", e);
        }
    }
}

/// Reenvía eventos de fin/error de Songbird al sink del player.
struct TrackEndRelay {
    sink: Arc<dyn TrackEndSink>,
    errored: bool,
}

#[async_trait]
impl VoiceEventHandler for TrackEndRelay {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        self.sink.track_ended(self.errored).await;
        None
    }
}

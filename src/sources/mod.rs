pub mod ingest;
pub mod spotify;
pub mod ytdlp;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

pub use spotify::SpotifyCatalog;
pub use ytdlp::YtDlpResolver;

/// Metadata de un stream ya resuelto, lista para encolar o reproducir.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub title: String,
    /// URL canónica de la página del video/audio.
    pub url: String,
    pub uploader: Option<String>,
    pub duration_secs: Option<u64>,
}

/// URL de audio directo entregada por la materialización; el transporte
/// la convierte en un input reproducible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSource {
    pub stream_url: String,
}

/// Fallos del resolver, clasificados en el límite del subproceso.
///
/// La distinción importante es `BotDetection`: es la única clase que
/// justifica probar otra estrategia de extracción o reintentar con
/// backoff. Todo lo demás es terminal para ese query.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("el proveedor detectó acceso automatizado: {0}")]
    BotDetection(String),

    #[error("sin resultados para: {0}")]
    NotFound(String),

    #[error("tiempo de espera agotado tras {0}s")]
    Timeout(u64),

    #[error("fallo de extracción: {0}")]
    Extraction(String),

    #[error("yt-dlp no disponible: {0}")]
    Unavailable(String),
}

impl SourceError {
    pub fn is_bot_detection(&self) -> bool {
        matches!(self, Self::BotDetection(_))
    }
}

/// Fallos del catálogo de streaming, reportados de forma distinguible
/// para que la capa de comandos pueda explicar cada caso.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("recurso no encontrado en el catálogo")]
    NotFound,

    #[error("acceso denegado por el catálogo")]
    AccessDenied,

    #[error("integración de catálogo deshabilitada (faltan credenciales)")]
    Disabled,

    #[error("error del catálogo: {0}")]
    Upstream(String),
}

/// Resuelve referencias de búsqueda o URLs en streams reproducibles.
///
/// Inyectado en el player para mantener el núcleo testeable sin yt-dlp.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Convierte un query (texto con marcador de búsqueda, o URL directa)
    /// en metadata de stream. Con múltiples resultados gana el primero.
    async fn resolve(&self, query: &str) -> Result<StreamInfo, SourceError>;

    /// Convierte la URL canónica en una URL de audio directo.
    async fn materialize(&self, url: &str) -> Result<PlaybackSource, SourceError>;
}

/// Stub mínimo de track tal como lo entrega el catálogo: suficiente para
/// construir una referencia que el resolver buscará después.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackStub {
    pub name: String,
    pub artist: String,
}

/// Track individual del catálogo con metadata completa.
#[derive(Debug, Clone)]
pub struct CatalogTrack {
    pub name: String,
    pub artist: String,
    pub duration_secs: u64,
}

/// Metadata de una colección (playlist o álbum).
#[derive(Debug, Clone)]
pub struct CollectionMeta {
    pub name: String,
    #[allow(dead_code)]
    pub owner: Option<String>,
    pub total_tracks: usize,
}

/// Servicio de metadata del catálogo de streaming (Spotify).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    fn is_enabled(&self) -> bool;

    async fn get_track(&self, id: &str) -> Result<CatalogTrack, CatalogError>;

    async fn get_playlist(&self, id: &str)
        -> Result<(CollectionMeta, Vec<TrackStub>), CatalogError>;

    async fn get_album(&self, id: &str) -> Result<(CollectionMeta, Vec<TrackStub>), CatalogError>;

    /// Solo el primer track de una playlist, para arrancar reproducción
    /// sin esperar la carga completa.
    async fn first_playlist_track(&self, id: &str) -> Result<Option<TrackStub>, CatalogError>;
}

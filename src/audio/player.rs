use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        queue::{MusicQueue, QueueError, QueueSnapshot},
        track::Track,
        transport::{TrackEndSink, VoiceConnection, VoiceGateway},
    },
    sources::{ytdlp, StreamResolver},
};

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("el bot no está conectado a un canal de voz")]
    NotConnected,

    #[error("no se pudo conectar al canal de voz: {0}")]
    Connection(String),

    #[error("fallo del transporte: {0}")]
    Transport(String),
}

/// Estado observable del player, derivado del slot de conexión y del
/// transporte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Connected,
    Playing,
    Paused,
}

/// Motivo registrado antes de detener el transporte. El callback de fin de
/// pista lo consume para decidir si avanza; la señal del transporte en sí
/// no distingue un skip de un shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    NaturalEnd,
    UserSkip,
    Shutdown,
}

/// Resultado de un intento de avance.
#[derive(Debug, Clone)]
pub enum PlayOutcome {
    /// Arrancó la reproducción de este track.
    Started(Track),
    /// No quedaba nada para reproducir.
    QueueEmpty,
    /// Se alcanzó el tope de fallos consecutivos; el resto de la cola
    /// queda intacto.
    SkipLimit(usize),
    /// Un stop/disconnect llegó durante el avance; el resultado de la
    /// resolución se descarta en vez de auto-reproducirse.
    Halted,
}

/// Efectos visibles hacia el usuario (mensajes de "reproduciendo ahora",
/// avisos de carga de playlists). Fuera del contrato del estado del player.
#[async_trait]
pub trait PlayerNotifier: Send + Sync {
    async fn now_playing(&self, guild_id: GuildId, track: &Track);

    async fn tracks_appended(&self, guild_id: GuildId, collection: &str, added: usize);
}

/// Notifier inerte, para tests y para arrancar sin canal de anuncios.
pub struct SilentNotifier;

#[async_trait]
impl PlayerNotifier for SilentNotifier {
    async fn now_playing(&self, _guild_id: GuildId, _track: &Track) {}

    async fn tracks_appended(&self, _guild_id: GuildId, _collection: &str, _added: usize) {}
}

/// Player de una guild: dueño de su cola y de su conexión de voz.
///
/// Todo avance (`play_next`) pasa por `advance_lock`, de modo que el
/// callback de fin de pista y los comandos del usuario forman un único
/// dominio de serialización: nunca hay dos avances en vuelo y nunca se
/// sacan dos tracks para una misma pista terminada.
pub struct GuildPlayer {
    guild_id: GuildId,
    queue: Mutex<MusicQueue>,
    connection: Mutex<Option<Arc<dyn VoiceConnection>>>,
    resolver: Arc<dyn StreamResolver>,
    gateway: Arc<dyn VoiceGateway>,
    notifier: Arc<dyn PlayerNotifier>,
    advance_lock: tokio::sync::Mutex<()>,
    pending_stop: Mutex<Option<StopReason>>,
    /// Se incrementa en cada halt/disconnect; un avance en vuelo que lo vea
    /// cambiar descarta su resultado.
    halt_epoch: AtomicU64,
    /// true mientras hay una pista entregada al transporte cuyo fin aún no
    /// se procesó; filtra eventos duplicados o tardíos.
    active_playback: AtomicBool,
    self_ref: Weak<GuildPlayer>,
    max_consecutive_skips: usize,
}

impl GuildPlayer {
    pub fn new(
        guild_id: GuildId,
        max_queue_size: usize,
        max_consecutive_skips: usize,
        resolver: Arc<dyn StreamResolver>,
        gateway: Arc<dyn VoiceGateway>,
        notifier: Arc<dyn PlayerNotifier>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            guild_id,
            queue: Mutex::new(MusicQueue::new(guild_id, max_queue_size)),
            connection: Mutex::new(None),
            resolver,
            gateway,
            notifier,
            advance_lock: tokio::sync::Mutex::new(()),
            pending_stop: Mutex::new(None),
            halt_epoch: AtomicU64::new(0),
            active_playback: AtomicBool::new(false),
            self_ref: weak.clone(),
            max_consecutive_skips,
        })
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    fn connection(&self) -> Option<Arc<dyn VoiceConnection>> {
        self.connection.lock().clone()
    }

    /// Conecta al canal de voz. Si ya está en ese canal es un no-op; si
    /// está en otro, se muda. Ante un fallo del transporte el player queda
    /// exactamente en el estado anterior.
    pub async fn connect(&self, channel_id: ChannelId) -> Result<(), PlayerError> {
        if let Some(conn) = self.connection() {
            if conn.channel_id() == channel_id {
                debug!("Ya conectado al canal {} en guild {}", channel_id, self.guild_id);
                return Ok(());
            }
        }

        let conn = self
            .gateway
            .join(self.guild_id, channel_id)
            .await
            .map_err(|e| PlayerError::Connection(e.to_string()))?;

        *self.connection.lock() = Some(conn);
        Ok(())
    }

    pub async fn state(&self) -> PlayerState {
        let Some(conn) = self.connection() else {
            return PlayerState::Idle;
        };

        if conn.is_playing().await {
            PlayerState::Playing
        } else if conn.is_paused().await {
            PlayerState::Paused
        } else {
            PlayerState::Connected
        }
    }

    pub async fn is_playing(&self) -> bool {
        matches!(self.state().await, PlayerState::Playing)
    }

    /// Avanza la reproducción: saca el próximo track, lo resuelve si hace
    /// falta, materializa el stream y lo entrega al transporte.
    ///
    /// Los fallos de resolución/materialización no se propagan: el track se
    /// descarta con un log y se intenta el siguiente, hasta
    /// `max_consecutive_skips` fallos seguidos.
    pub async fn play_next(&self) -> Result<PlayOutcome, PlayerError> {
        let _advance = self.advance_lock.lock().await;

        if self.connection().is_none() {
            return Err(PlayerError::NotConnected);
        }
        let epoch = self.halt_epoch.load(Ordering::Acquire);

        let mut skipped = 0usize;
        loop {
            if skipped >= self.max_consecutive_skips {
                warn!(
                    "⚠️ Avance abandonado tras {} fallos consecutivos en guild {}",
                    skipped, self.guild_id
                );
                return Ok(PlayOutcome::SkipLimit(skipped));
            }

            let Some(mut track) = self.queue.lock().get_next_track() else {
                return Ok(PlayOutcome::QueueEmpty);
            };

            // Las referencias de catálogo se resuelven recién acá, al
            // llegar al frente de la cola.
            if track.needs_resolution() {
                let query = ytdlp::search_reference(&track.search_query);
                match self.resolver.resolve(&query).await {
                    Ok(info) => track.apply_resolution(&info),
                    Err(e) => {
                        warn!("❌ No se pudo resolver '{}': {}", track, e);
                        skipped += 1;
                        continue;
                    }
                }
            }

            let Some(url) = track.url.clone() else {
                warn!("❌ Track sin URL tras resolver: {}", track);
                skipped += 1;
                continue;
            };

            let source = match self.resolver.materialize(&url).await {
                Ok(source) => source,
                Err(e) => {
                    warn!("❌ No se pudo materializar '{}': {}", track, e);
                    skipped += 1;
                    continue;
                }
            };

            // Un stop/disconnect durante la resolución invalida el avance.
            if self.halt_epoch.load(Ordering::Acquire) != epoch {
                debug!("Avance descartado por stop en guild {}", self.guild_id);
                return Ok(PlayOutcome::Halted);
            }
            let Some(conn) = self.connection() else {
                return Ok(PlayOutcome::Halted);
            };

            let sink: Arc<dyn TrackEndSink> = Arc::new(EndOfTrack {
                player: self.self_ref.clone(),
            });

            self.queue.lock().set_current(track.clone());
            conn.play(source, sink)
                .await
                .map_err(|e| PlayerError::Transport(e.to_string()))?;
            self.active_playback.store(true, Ordering::Release);

            info!("🎵 Reproduciendo: {} en guild {}", track, self.guild_id);
            self.notifier.now_playing(self.guild_id, &track).await;

            return Ok(PlayOutcome::Started(track));
        }
    }

    /// Pausa solo si hay algo sonando; si no, devuelve false sin quejarse.
    pub async fn pause(&self) -> bool {
        let Some(conn) = self.connection() else {
            return false;
        };

        if conn.is_playing().await {
            info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
            conn.pause().await
        } else {
            false
        }
    }

    /// Reanuda solo si está pausado.
    pub async fn resume(&self) -> bool {
        let Some(conn) = self.connection() else {
            return false;
        };

        if conn.is_paused().await {
            info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
            conn.resume().await
        } else {
            false
        }
    }

    /// Salta la pista actual. Es exactamente un stop: el avance viaja en el
    /// callback de fin de pista.
    pub async fn skip(&self) -> bool {
        self.stop_current(StopReason::UserSkip).await
    }

    /// Detiene la reproducción sin avanzar. La cola no se toca; eso lo
    /// decide el caller.
    pub async fn halt(&self) -> bool {
        self.halt_epoch.fetch_add(1, Ordering::AcqRel);
        self.stop_current(StopReason::Shutdown).await
    }

    async fn stop_current(&self, reason: StopReason) -> bool {
        let Some(conn) = self.connection() else {
            return false;
        };

        if !(conn.is_playing().await || conn.is_paused().await) {
            return false;
        }

        *self.pending_stop.lock() = Some(reason);
        conn.stop().await;
        info!("⏹️ Reproducción detenida ({:?}) en guild {}", reason, self.guild_id);
        true
    }

    /// Suelta la conexión de voz. La cola sobrevive.
    pub async fn disconnect(&self) {
        self.halt_epoch.fetch_add(1, Ordering::AcqRel);
        *self.pending_stop.lock() = Some(StopReason::Shutdown);

        let conn = self.connection.lock().take();
        if let Some(conn) = conn {
            conn.disconnect().await;
            info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        }

        self.active_playback.store(false, Ordering::Release);
    }

    async fn handle_track_end(&self, errored: bool) {
        // Songbird puede emitir End y Error para la misma pista; solo el
        // primer evento cuenta.
        if !self.active_playback.swap(false, Ordering::AcqRel) {
            debug!("Evento de fin de pista tardío ignorado en guild {}", self.guild_id);
            return;
        }

        let reason = self
            .pending_stop
            .lock()
            .take()
            .unwrap_or(StopReason::NaturalEnd);

        if errored {
            error!(
                "❌ El transporte reportó un error de pista en guild {}; no se reintenta",
                self.guild_id
            );
            return;
        }

        match reason {
            StopReason::Shutdown => {
                debug!("Stop definitivo en guild {}, sin avance", self.guild_id);
            }
            StopReason::NaturalEnd | StopReason::UserSkip => match self.play_next().await {
                Ok(PlayOutcome::Started(_)) | Ok(PlayOutcome::Halted) => {}
                Ok(PlayOutcome::QueueEmpty) => {
                    info!("📭 Cola agotada en guild {}", self.guild_id);
                }
                Ok(PlayOutcome::SkipLimit(n)) => {
                    warn!("⚠️ Cola pausada tras {} fallos en guild {}", n, self.guild_id);
                }
                Err(e) => error!("Error al avanzar la cola en guild {}: {}", self.guild_id, e),
            },
        }
    }

    // Operaciones de cola, delegadas bajo su propio lock. `enqueue_many` es
    // la única mutación segura fuera del dominio de serialización (la usa
    // la ingesta en segundo plano).

    pub fn enqueue(&self, track: Track) -> Result<usize, QueueError> {
        self.queue.lock().add_track(track)
    }

    pub fn enqueue_many(&self, tracks: Vec<Track>) -> usize {
        self.queue.lock().add_tracks(tracks)
    }

    pub fn clear_queue(&self) -> usize {
        self.queue.lock().clear()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn queue_snapshot(&self) -> QueueSnapshot {
        self.queue.lock().snapshot()
    }

    pub fn upcoming(&self, limit: usize) -> Vec<String> {
        self.queue.lock().upcoming(limit)
    }

    pub fn current_track(&self) -> Option<Track> {
        self.queue.lock().current().cloned()
    }

    pub fn toggle_shuffle(&self) -> bool {
        self.queue.lock().toggle_shuffle()
    }
}

/// Sink de fin de pista entregado al transporte; sostiene una referencia
/// débil para no atar la vida del player a la del track handle.
struct EndOfTrack {
    player: Weak<GuildPlayer>,
}

#[async_trait]
impl TrackEndSink for EndOfTrack {
    async fn track_ended(&self, errored: bool) {
        if let Some(player) = self.player.upgrade() {
            player.handle_track_end(errored).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        audio::transport::TransportError,
        sources::{MockStreamResolver, PlaybackSource, SourceError, StreamInfo},
    };

    #[derive(Default)]
    struct FakeState {
        playing: bool,
        paused: bool,
        plays: Vec<PlaybackSource>,
        sink: Option<Arc<dyn TrackEndSink>>,
    }

    struct FakeConnection {
        channel: ChannelId,
        state: Mutex<FakeState>,
    }

    impl FakeConnection {
        fn new(channel: u64) -> Arc<Self> {
            Arc::new(Self {
                channel: ChannelId::new(channel),
                state: Mutex::new(FakeState::default()),
            })
        }

        fn play_count(&self) -> usize {
            self.state.lock().plays.len()
        }

        /// Simula el evento de fin de pista que dispararía el transporte.
        async fn fire_end(&self) {
            let sink = {
                let mut state = self.state.lock();
                state.playing = false;
                state.paused = false;
                state.sink.clone()
            };
            if let Some(sink) = sink {
                sink.track_ended(false).await;
            }
        }
    }

    #[async_trait]
    impl VoiceConnection for FakeConnection {
        fn channel_id(&self) -> ChannelId {
            self.channel
        }

        async fn play(
            &self,
            source: PlaybackSource,
            on_end: Arc<dyn TrackEndSink>,
        ) -> Result<(), TransportError> {
            let mut state = self.state.lock();
            state.playing = true;
            state.paused = false;
            state.plays.push(source);
            state.sink = Some(on_end);
            Ok(())
        }

        async fn pause(&self) -> bool {
            let mut state = self.state.lock();
            state.playing = false;
            state.paused = true;
            true
        }

        async fn resume(&self) -> bool {
            let mut state = self.state.lock();
            state.playing = true;
            state.paused = false;
            true
        }

        async fn stop(&self) {
            let mut state = self.state.lock();
            state.playing = false;
            state.paused = false;
        }

        async fn is_playing(&self) -> bool {
            self.state.lock().playing
        }

        async fn is_paused(&self) -> bool {
            self.state.lock().paused
        }

        async fn disconnect(&self) {
            self.stop().await;
        }
    }

    struct FakeGateway {
        conn: Arc<FakeConnection>,
        fail: bool,
    }

    #[async_trait]
    impl VoiceGateway for FakeGateway {
        async fn join(
            &self,
            _guild_id: GuildId,
            _channel_id: ChannelId,
        ) -> Result<Arc<dyn VoiceConnection>, TransportError> {
            if self.fail {
                Err(TransportError::Join("canal lleno".to_string()))
            } else {
                Ok(self.conn.clone())
            }
        }
    }

    fn working_resolver() -> MockStreamResolver {
        let mut resolver = MockStreamResolver::new();
        resolver.expect_resolve().returning(|query| {
            Ok(StreamInfo {
                title: query.to_string(),
                url: format!("https://youtu.be/{}", query.len()),
                uploader: Some("Canal".to_string()),
                duration_secs: Some(200),
            })
        });
        resolver
            .expect_materialize()
            .returning(|url| Ok(PlaybackSource { stream_url: format!("{}/audio", url) }));
        resolver
    }

    fn build_player(
        resolver: MockStreamResolver,
        conn: Arc<FakeConnection>,
        skips: usize,
    ) -> Arc<GuildPlayer> {
        GuildPlayer::new(
            GuildId::new(7),
            10,
            skips,
            Arc::new(resolver),
            Arc::new(FakeGateway { conn, fail: false }),
            Arc::new(SilentNotifier),
        )
    }

    async fn connected_player(
        resolver: MockStreamResolver,
        skips: usize,
    ) -> (Arc<GuildPlayer>, Arc<FakeConnection>) {
        let conn = FakeConnection::new(42);
        let player = build_player(resolver, conn.clone(), skips);
        player.connect(ChannelId::new(42)).await.unwrap();
        (player, conn)
    }

    #[tokio::test]
    async fn test_play_next_requires_connection() {
        let player = build_player(MockStreamResolver::new(), FakeConnection::new(42), 5);
        assert!(matches!(player.play_next().await, Err(PlayerError::NotConnected)));
    }

    #[tokio::test]
    async fn test_play_next_on_empty_queue() {
        let (player, conn) = connected_player(MockStreamResolver::new(), 5).await;

        let outcome = player.play_next().await.unwrap();

        assert!(matches!(outcome, PlayOutcome::QueueEmpty));
        assert_eq!(conn.play_count(), 0);
        assert!(player.current_track().is_none());
    }

    #[tokio::test]
    async fn test_play_next_resolves_and_starts() {
        let (player, conn) = connected_player(working_resolver(), 5).await;
        player.enqueue(Track::from_catalog("Song", "Artista", None)).unwrap();

        let outcome = player.play_next().await.unwrap();

        assert!(matches!(outcome, PlayOutcome::Started(_)));
        assert_eq!(conn.play_count(), 1);
        let current = player.current_track().unwrap();
        assert!(!current.needs_resolution());
        assert!(current.url.is_some());
        assert_eq!(player.queue_len(), 0);
        assert!(player.is_playing().await);
    }

    #[tokio::test]
    async fn test_unresolvable_queue_drains_without_playing() {
        let mut resolver = MockStreamResolver::new();
        resolver
            .expect_resolve()
            .returning(|query| Err(SourceError::NotFound(query.to_string())));
        let (player, conn) = connected_player(resolver, 5).await;

        for name in ["a", "b", "c"] {
            player.enqueue(Track::from_catalog(name, "x", None)).unwrap();
        }

        let outcome = player.play_next().await.unwrap();

        assert!(matches!(outcome, PlayOutcome::QueueEmpty));
        assert_eq!(conn.play_count(), 0);
        assert!(player.current_track().is_none());
        assert_eq!(player.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_skip_limit_leaves_rest_of_queue() {
        let mut resolver = MockStreamResolver::new();
        resolver
            .expect_resolve()
            .returning(|query| Err(SourceError::Extraction(query.to_string())));
        let (player, conn) = connected_player(resolver, 2).await;

        for name in ["a", "b", "c", "d", "e"] {
            player.enqueue(Track::from_catalog(name, "x", None)).unwrap();
        }

        let outcome = player.play_next().await.unwrap();

        assert!(matches!(outcome, PlayOutcome::SkipLimit(2)));
        assert_eq!(conn.play_count(), 0);
        assert_eq!(player.queue_len(), 3);
    }

    #[tokio::test]
    async fn test_materialize_failure_skips_to_next() {
        let mut resolver = MockStreamResolver::new();
        resolver.expect_resolve().returning(|query| {
            Ok(StreamInfo {
                title: query.to_string(),
                url: if query.contains("mala") {
                    "https://youtu.be/mala".to_string()
                } else {
                    "https://youtu.be/buena".to_string()
                },
                uploader: None,
                duration_secs: None,
            })
        });
        resolver.expect_materialize().returning(|url| {
            if url.contains("mala") {
                Err(SourceError::Extraction("formato no disponible".to_string()))
            } else {
                Ok(PlaybackSource { stream_url: format!("{}/audio", url) })
            }
        });
        let (player, conn) = connected_player(resolver, 5).await;

        player.enqueue(Track::from_catalog("mala", "x", None)).unwrap();
        player.enqueue(Track::from_catalog("buena", "x", None)).unwrap();

        let outcome = player.play_next().await.unwrap();

        assert!(matches!(outcome, PlayOutcome::Started(_)));
        assert_eq!(conn.play_count(), 1);
        assert_eq!(player.current_track().unwrap().title, "buena");
    }

    #[tokio::test]
    async fn test_pause_resume_idempotent() {
        let (player, _conn) = connected_player(working_resolver(), 5).await;

        // Nada sonando: ambos son no-ops
        assert!(!player.pause().await);
        assert!(!player.resume().await);

        player.enqueue(Track::from_catalog("Song", "x", None)).unwrap();
        player.play_next().await.unwrap();

        assert!(player.pause().await);
        assert!(!player.pause().await);
        assert_eq!(player.state().await, PlayerState::Paused);

        assert!(player.resume().await);
        assert!(!player.resume().await);
        assert_eq!(player.state().await, PlayerState::Playing);
    }

    #[tokio::test]
    async fn test_skip_advances_via_callback() {
        let (player, conn) = connected_player(working_resolver(), 5).await;
        player.enqueue(Track::from_catalog("primera", "x", None)).unwrap();
        player.enqueue(Track::from_catalog("segunda", "x", None)).unwrap();
        player.play_next().await.unwrap();

        assert!(player.skip().await);
        // El transporte reporta el fin de la pista detenida
        conn.fire_end().await;

        assert_eq!(conn.play_count(), 2);
        assert_eq!(player.current_track().unwrap().title, "segunda");
    }

    #[tokio::test]
    async fn test_halt_does_not_advance() {
        let (player, conn) = connected_player(working_resolver(), 5).await;
        player.enqueue(Track::from_catalog("primera", "x", None)).unwrap();
        player.enqueue(Track::from_catalog("segunda", "x", None)).unwrap();
        player.play_next().await.unwrap();

        assert!(player.halt().await);
        conn.fire_end().await;

        assert_eq!(conn.play_count(), 1);
        assert_eq!(player.queue_len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_end_events_are_ignored() {
        let (player, conn) = connected_player(working_resolver(), 5).await;
        player.enqueue(Track::from_catalog("única", "x", None)).unwrap();
        player.play_next().await.unwrap();

        conn.fire_end().await;
        conn.fire_end().await;

        // Un solo avance procesado; el segundo evento no dispara nada
        assert_eq!(conn.play_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_same_channel_is_noop() {
        let conn = FakeConnection::new(42);
        let player = build_player(working_resolver(), conn, 5);

        player.connect(ChannelId::new(42)).await.unwrap();
        player.connect(ChannelId::new(42)).await.unwrap();
        assert_eq!(player.state().await, PlayerState::Connected);
    }

    #[tokio::test]
    async fn test_failed_connect_keeps_prior_state() {
        let player = GuildPlayer::new(
            GuildId::new(7),
            10,
            5,
            Arc::new(MockStreamResolver::new()),
            Arc::new(FakeGateway { conn: FakeConnection::new(1), fail: true }),
            Arc::new(SilentNotifier),
        );

        let result = player.connect(ChannelId::new(1)).await;

        assert!(matches!(result, Err(PlayerError::Connection(_))));
        assert_eq!(player.state().await, PlayerState::Idle);
    }

    #[tokio::test]
    async fn test_concurrent_advances_start_exactly_one() {
        let (player, conn) = connected_player(working_resolver(), 5).await;
        player.enqueue(Track::from_catalog("única", "x", None)).unwrap();

        let (a, b) = tokio::join!(player.play_next(), player.play_next());

        let started = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|o| matches!(o, PlayOutcome::Started(_)))
            .count();
        assert_eq!(started, 1);
        assert_eq!(conn.play_count(), 1);
    }

    /// Resolver que tarda, para poder colar un halt en medio del avance.
    struct SlowResolver;

    #[async_trait]
    impl StreamResolver for SlowResolver {
        async fn resolve(&self, query: &str) -> Result<StreamInfo, SourceError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(StreamInfo {
                title: query.to_string(),
                url: "https://youtu.be/lenta".to_string(),
                uploader: None,
                duration_secs: None,
            })
        }

        async fn materialize(&self, url: &str) -> Result<PlaybackSource, SourceError> {
            Ok(PlaybackSource { stream_url: url.to_string() })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_halt_during_resolution_discards_result() {
        let conn = FakeConnection::new(42);
        let player = GuildPlayer::new(
            GuildId::new(7),
            10,
            5,
            Arc::new(SlowResolver),
            Arc::new(FakeGateway { conn: conn.clone(), fail: false }),
            Arc::new(SilentNotifier),
        );
        player.connect(ChannelId::new(42)).await.unwrap();
        player.enqueue(Track::from_catalog("lenta", "x", None)).unwrap();

        let advancing = tokio::spawn({
            let player = player.clone();
            async move { player.play_next().await }
        });

        // Dejar que el avance llegue hasta la resolución
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        player.halt().await;

        let outcome = advancing.await.unwrap().unwrap();
        assert!(matches!(outcome, PlayOutcome::Halted));
        assert_eq!(conn.play_count(), 0);
        assert!(player.current_track().is_none());
    }
}

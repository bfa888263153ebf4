use std::sync::Arc;

use serenity::model::id::UserId;
use tracing::{info, warn};

use crate::{
    audio::{
        player::{GuildPlayer, PlayerNotifier},
        track::Track,
    },
    sources::{Catalog, CatalogError, TrackStub},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Playlist,
    Album,
}

/// Carga el resto de una colección en segundo plano.
///
/// El primer track ya fue encolado por el handler para arrancar la
/// reproducción sin esperar; esta tarea trae los demás y los anexa vía
/// `enqueue_many` (append-only, con chequeo de capacidad), la única
/// mutación segura fuera del lock de avance del player. Sus fallos no
/// tocan la reproducción en curso: se loguean y listo.
pub fn spawn_collection_ingest(
    player: Arc<GuildPlayer>,
    catalog: Arc<dyn Catalog>,
    notifier: Arc<dyn PlayerNotifier>,
    kind: CollectionKind,
    id: String,
    requested_by: Option<UserId>,
) {
    tokio::spawn(async move {
        if let Err(e) =
            ingest_collection(&player, catalog.as_ref(), notifier.as_ref(), kind, &id, requested_by)
                .await
        {
            warn!(
                "⚠️ Ingesta de {:?} {} falló en guild {}: {}",
                kind,
                id,
                player.guild_id(),
                e
            );
        }
    });
}

/// Anexa stubs ya obtenidos (p.ej. el resto de un álbum que vino entero en
/// la consulta inicial) sin volver a consultar el catálogo.
pub fn spawn_stub_append(
    player: Arc<GuildPlayer>,
    notifier: Arc<dyn PlayerNotifier>,
    collection_name: String,
    stubs: Vec<TrackStub>,
    requested_by: Option<UserId>,
) {
    if stubs.is_empty() {
        return;
    }

    tokio::spawn(async move {
        let added = append_stubs(&player, stubs, requested_by);
        notifier
            .tracks_appended(player.guild_id(), &collection_name, added)
            .await;
    });
}

async fn ingest_collection(
    player: &GuildPlayer,
    catalog: &dyn Catalog,
    notifier: &dyn PlayerNotifier,
    kind: CollectionKind,
    id: &str,
    requested_by: Option<UserId>,
) -> Result<(), CatalogError> {
    let (meta, stubs) = match kind {
        CollectionKind::Playlist => catalog.get_playlist(id).await?,
        CollectionKind::Album => catalog.get_album(id).await?,
    };

    // El primero ya está encolado
    let remaining: Vec<TrackStub> = stubs.into_iter().skip(1).collect();
    if remaining.is_empty() {
        return Ok(());
    }

    let added = append_stubs(player, remaining, requested_by);
    info!(
        "📋 Ingesta de '{}' ({} totales): {} tracks agregados en guild {}",
        meta.name,
        meta.total_tracks,
        added,
        player.guild_id()
    );

    notifier
        .tracks_appended(player.guild_id(), &meta.name, added)
        .await;

    Ok(())
}

fn append_stubs(player: &GuildPlayer, stubs: Vec<TrackStub>, requested_by: Option<UserId>) -> usize {
    let tracks: Vec<Track> = stubs
        .into_iter()
        .map(|stub| Track::from_catalog(stub.name, stub.artist, requested_by))
        .collect();

    player.enqueue_many(tracks)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serenity::model::id::{ChannelId, GuildId};

    use super::*;
    use crate::{
        audio::transport::{TransportError, VoiceConnection, VoiceGateway},
        sources::{CollectionMeta, MockCatalog, MockStreamResolver},
    };

    struct NoGateway;

    #[async_trait]
    impl VoiceGateway for NoGateway {
        async fn join(
            &self,
            _guild_id: GuildId,
            _channel_id: ChannelId,
        ) -> Result<Arc<dyn VoiceConnection>, TransportError> {
            Err(TransportError::Join("sin transporte en tests".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        appended: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl PlayerNotifier for RecordingNotifier {
        async fn now_playing(&self, _guild_id: GuildId, _track: &Track) {}

        async fn tracks_appended(&self, _guild_id: GuildId, collection: &str, added: usize) {
            self.appended.lock().push((collection.to_string(), added));
        }
    }

    fn test_player(max_queue: usize) -> Arc<GuildPlayer> {
        GuildPlayer::new(
            GuildId::new(9),
            max_queue,
            5,
            Arc::new(MockStreamResolver::new()),
            Arc::new(NoGateway),
            Arc::new(crate::audio::player::SilentNotifier),
        )
    }

    fn stubs(count: usize) -> Vec<TrackStub> {
        (0..count)
            .map(|i| TrackStub { name: format!("tema {}", i), artist: "Artista".to_string() })
            .collect()
    }

    #[tokio::test]
    async fn test_ingest_appends_remainder_without_touching_current() {
        let player = test_player(100);
        let notifier = RecordingNotifier::default();

        // El handler ya encoló y "reprodujo" el primero
        let first = Track::from_catalog("tema 0", "Artista", None);
        player.enqueue(first).unwrap();
        let playing = player.queue_snapshot();
        assert_eq!(playing.length, 1);

        let mut catalog = MockCatalog::new();
        catalog.expect_get_playlist().returning(|_| {
            Ok((
                CollectionMeta {
                    name: "Mi Playlist".to_string(),
                    owner: None,
                    total_tracks: 10,
                },
                (0..10)
                    .map(|i| TrackStub {
                        name: format!("tema {}", i),
                        artist: "Artista".to_string(),
                    })
                    .collect(),
            ))
        });

        ingest_collection(&player, &catalog, &notifier, CollectionKind::Playlist, "id", None)
            .await
            .unwrap();

        // 1 ya encolado + 9 del resto de la playlist
        assert_eq!(player.queue_len(), 10);
        assert_eq!(notifier.appended.lock().as_slice(), &[("Mi Playlist".to_string(), 9)]);
    }

    #[tokio::test]
    async fn test_ingest_respects_queue_capacity() {
        let player = test_player(5);
        let notifier = RecordingNotifier::default();
        player.enqueue(Track::from_catalog("tema 0", "Artista", None)).unwrap();

        let mut catalog = MockCatalog::new();
        catalog.expect_get_playlist().returning(|_| {
            Ok((
                CollectionMeta { name: "Larga".to_string(), owner: None, total_tracks: 50 },
                (0..50)
                    .map(|i| TrackStub {
                        name: format!("tema {}", i),
                        artist: "Artista".to_string(),
                    })
                    .collect(),
            ))
        });

        ingest_collection(&player, &catalog, &notifier, CollectionKind::Playlist, "id", None)
            .await
            .unwrap();

        assert_eq!(player.queue_len(), 5);
        assert_eq!(notifier.appended.lock().as_slice(), &[("Larga".to_string(), 4)]);
    }

    #[tokio::test]
    async fn test_ingest_failure_is_reported_as_error() {
        let player = test_player(100);
        let notifier = RecordingNotifier::default();

        let mut catalog = MockCatalog::new();
        catalog
            .expect_get_album()
            .returning(|_| Err(CatalogError::NotFound));

        let result =
            ingest_collection(&player, &catalog, &notifier, CollectionKind::Album, "id", None)
                .await;

        assert!(matches!(result, Err(CatalogError::NotFound)));
        assert_eq!(player.queue_len(), 0);
        assert!(notifier.appended.lock().is_empty());
    }

    #[tokio::test]
    async fn test_append_stubs_builds_catalog_tracks() {
        let player = test_player(100);

        let added = append_stubs(&player, stubs(3), None);

        assert_eq!(added, 3);
        let upcoming = player.upcoming(5);
        assert_eq!(upcoming[0], "Artista - tema 0");
    }
}

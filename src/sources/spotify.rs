use std::sync::LazyLock;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{Catalog, CatalogError, CatalogTrack, CollectionMeta, TrackStub};
use crate::config::Config;

const ACCOUNTS_URL: &str = "https://accounts.spotify.com/api/token";
const API_URL: &str = "https://api.spotify.com/v1";

/// Referencia de catálogo extraída de una URL o URI de Spotify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogRef {
    Track(String),
    Playlist(String),
    Album(String),
}

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:open\.)?spotify\.com/(?:intl-[a-z]+/)?(track|playlist|album)/([A-Za-z0-9]+)")
        .unwrap()
});

static URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"spotify:(track|playlist|album):([A-Za-z0-9]+)").unwrap());

/// Reconoce URLs `open.spotify.com/...` y URIs `spotify:...:` de tracks,
/// playlists y álbumes.
pub fn parse_catalog_ref(input: &str) -> Option<CatalogRef> {
    let captures = URL_RE.captures(input).or_else(|| URI_RE.captures(input))?;

    let id = captures[2].to_string();
    match &captures[1] {
        "track" => Some(CatalogRef::Track(id)),
        "playlist" => Some(CatalogRef::Playlist(id)),
        "album" => Some(CatalogRef::Album(id)),
        _ => None,
    }
}

pub fn is_catalog_url(input: &str) -> bool {
    parse_catalog_ref(input).is_some()
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Cliente del catálogo de Spotify con credenciales de aplicación.
///
/// Sin credenciales el cliente existe igual pero reporta `Disabled` en
/// cada consulta, así el bot arranca y el resto de las fuentes funciona.
pub struct SpotifyCatalog {
    http: reqwest::Client,
    credentials: Option<(String, String)>,
    token: parking_lot::Mutex<Option<CachedToken>>,
    max_playlist_items: usize,
}

impl SpotifyCatalog {
    pub fn new(config: &Config) -> Self {
        let credentials = config
            .spotify_client_id
            .clone()
            .zip(config.spotify_client_secret.clone());

        if credentials.is_some() {
            info!("🎧 Integración con Spotify habilitada");
        } else {
            warn!("🎧 Sin credenciales de Spotify; URLs del catálogo deshabilitadas");
        }

        Self {
            http: reqwest::Client::new(),
            credentials,
            token: parking_lot::Mutex::new(None),
            max_playlist_items: config.max_playlist_size,
        }
    }

    /// Token client-credentials, cacheado hasta un minuto antes de vencer.
    async fn token(&self) -> Result<String, CatalogError> {
        let Some((client_id, client_secret)) = &self.credentials else {
            return Err(CatalogError::Disabled);
        };

        {
            let guard = self.token.lock();
            if let Some(cached) = guard.as_ref() {
                if cached.expires_at > Utc::now() {
                    return Ok(cached.value.clone());
                }
            }
        }

        debug!("🔑 Renovando token de Spotify");
        let auth = BASE64.encode(format!("{}:{}", client_id, client_secret));
        let response = self
            .http
            .post(ACCOUNTS_URL)
            .header("Authorization", format!("Basic {}", auth))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| CatalogError::Upstream(e.to_string()))?;

        check_status(response.status())?;

        let payload: TokenResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Upstream(e.to_string()))?;

        let expires_at = Utc::now() + chrono::Duration::seconds(payload.expires_in.max(120) - 60);
        *self.token.lock() = Some(CachedToken {
            value: payload.access_token.clone(),
            expires_at,
        });

        Ok(payload.access_token)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        let token = self.token().await?;

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CatalogError::Upstream(e.to_string()))?;

        check_status(response.status())?;

        response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::Upstream(e.to_string()))
    }
}

#[async_trait]
impl Catalog for SpotifyCatalog {
    fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    async fn get_track(&self, id: &str) -> Result<CatalogTrack, CatalogError> {
        let track: ApiTrack = self.get_json(&format!("{}/tracks/{}", API_URL, id)).await?;
        to_catalog_track(track)
    }

    async fn get_playlist(
        &self,
        id: &str,
    ) -> Result<(CollectionMeta, Vec<TrackStub>), CatalogError> {
        let playlist: ApiPlaylist = self
            .get_json(&format!(
                "{}/playlists/{}?fields=name,owner.display_name,tracks.total",
                API_URL, id
            ))
            .await?;

        let page: ApiPlaylistPage = self
            .get_json(&format!(
                "{}/playlists/{}/tracks?limit={}&offset=0",
                API_URL, id, self.max_playlist_items
            ))
            .await?;

        let meta = CollectionMeta {
            name: playlist.name,
            owner: playlist.owner.and_then(|o| o.display_name),
            total_tracks: playlist.tracks.map(|t| t.total).unwrap_or(0),
        };

        Ok((meta, collect_stubs(page.items)))
    }

    async fn get_album(&self, id: &str) -> Result<(CollectionMeta, Vec<TrackStub>), CatalogError> {
        let album: ApiAlbum = self.get_json(&format!("{}/albums/{}", API_URL, id)).await?;

        let owner = album.artists.first().map(|a| a.name.clone());
        let stubs: Vec<TrackStub> = album
            .tracks
            .items
            .into_iter()
            .filter_map(|track| {
                let artist = track.artists.first()?.name.clone();
                Some(TrackStub { name: track.name, artist })
            })
            .collect();

        let meta = CollectionMeta {
            name: album.name,
            owner,
            total_tracks: album.total_tracks,
        };

        Ok((meta, stubs))
    }

    async fn first_playlist_track(&self, id: &str) -> Result<Option<TrackStub>, CatalogError> {
        let page: ApiPlaylistPage = self
            .get_json(&format!(
                "{}/playlists/{}/tracks?limit=1&offset=0",
                API_URL, id
            ))
            .await?;

        Ok(collect_stubs(page.items).into_iter().next())
    }
}

fn check_status(status: reqwest::StatusCode) -> Result<(), CatalogError> {
    use reqwest::StatusCode;

    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(CatalogError::NotFound),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CatalogError::AccessDenied),
        s => Err(CatalogError::Upstream(format!("HTTP {}", s))),
    }
}

fn to_catalog_track(track: ApiTrack) -> Result<CatalogTrack, CatalogError> {
    let artist = track
        .artists
        .first()
        .map(|a| a.name.clone())
        .ok_or_else(|| CatalogError::Upstream("track sin artistas".to_string()))?;

    Ok(CatalogTrack {
        name: track.name,
        artist,
        duration_secs: track.duration_ms.unwrap_or(0) / 1000,
    })
}

/// La API devuelve entradas nulas para tracks removidos o regionales;
/// se filtran acá igual que los tracks sin artistas.
fn collect_stubs(items: Vec<ApiPlaylistItem>) -> Vec<TrackStub> {
    items
        .into_iter()
        .filter_map(|item| item.track)
        .filter_map(|track| {
            let artist = track.artists.first()?.name.clone();
            Some(TrackStub { name: track.name, artist })
        })
        .collect()
}

// Payloads de la Web API

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    name: String,
    #[serde(default)]
    artists: Vec<ApiArtist>,
    #[serde(default)]
    duration_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiOwner {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylistTracksField {
    total: usize,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylist {
    name: String,
    owner: Option<ApiOwner>,
    tracks: Option<ApiPlaylistTracksField>,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylistItem {
    track: Option<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylistPage {
    #[serde(default)]
    items: Vec<ApiPlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct ApiAlbumTracks {
    #[serde(default)]
    items: Vec<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiAlbum {
    name: String,
    #[serde(default)]
    artists: Vec<ApiArtist>,
    #[serde(default)]
    total_tracks: usize,
    tracks: ApiAlbumTracks,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_track_url() {
        let parsed =
            parse_catalog_ref("https://open.spotify.com/track/4iV5W9uYEdYUVa79Axb7Rh?si=xyz");
        assert_eq!(parsed, Some(CatalogRef::Track("4iV5W9uYEdYUVa79Axb7Rh".to_string())));
    }

    #[test]
    fn test_parse_playlist_and_album_urls() {
        assert_eq!(
            parse_catalog_ref("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"),
            Some(CatalogRef::Playlist("37i9dQZF1DXcBWIGoYBM5M".to_string()))
        );
        assert_eq!(
            parse_catalog_ref("https://open.spotify.com/intl-es/album/6dVIqQ8qmQ5GBnJ9shOYGE"),
            Some(CatalogRef::Album("6dVIqQ8qmQ5GBnJ9shOYGE".to_string()))
        );
    }

    #[test]
    fn test_parse_uri_form() {
        assert_eq!(
            parse_catalog_ref("spotify:track:4iV5W9uYEdYUVa79Axb7Rh"),
            Some(CatalogRef::Track("4iV5W9uYEdYUVa79Axb7Rh".to_string()))
        );
    }

    #[test]
    fn test_non_catalog_urls_rejected() {
        assert_eq!(parse_catalog_ref("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(parse_catalog_ref("https://open.spotify.com/show/abc123"), None);
        assert!(!is_catalog_url("Queen Bohemian Rhapsody"));
    }

    #[test]
    fn test_duration_converted_to_seconds() {
        let track = ApiTrack {
            name: "Song".to_string(),
            artists: vec![ApiArtist { name: "Artista".to_string() }],
            duration_ms: Some(213_456),
        };

        let converted = to_catalog_track(track).unwrap();
        assert_eq!(converted.duration_secs, 213);
        assert_eq!(converted.artist, "Artista");
    }

    #[test]
    fn test_track_without_artists_is_upstream_error() {
        let track = ApiTrack {
            name: "Song".to_string(),
            artists: vec![],
            duration_ms: None,
        };

        assert!(matches!(to_catalog_track(track), Err(CatalogError::Upstream(_))));
    }

    #[test]
    fn test_collect_stubs_skips_null_and_artistless_entries() {
        let items = vec![
            ApiPlaylistItem {
                track: Some(ApiTrack {
                    name: "buena".to_string(),
                    artists: vec![ApiArtist { name: "A".to_string() }],
                    duration_ms: None,
                }),
            },
            ApiPlaylistItem { track: None },
            ApiPlaylistItem {
                track: Some(ApiTrack {
                    name: "sin artista".to_string(),
                    artists: vec![],
                    duration_ms: None,
                }),
            },
        ];

        let stubs = collect_stubs(items);
        assert_eq!(stubs, vec![TrackStub { name: "buena".to_string(), artist: "A".to_string() }]);
    }

    #[tokio::test]
    async fn test_disabled_catalog_reports_disabled() {
        let catalog = SpotifyCatalog::new(&Config::default());

        assert!(!catalog.is_enabled());
        assert!(matches!(catalog.get_track("abc").await, Err(CatalogError::Disabled)));
        assert!(matches!(
            catalog.first_playlist_track("abc").await,
            Err(CatalogError::Disabled)
        ));
    }
}

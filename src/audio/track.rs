use std::fmt;

use serenity::model::id::UserId;

use crate::sources::StreamInfo;

/// Origen de un track encolado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOrigin {
    /// Llegó con URL de medio ya resuelta (link directo o búsqueda resuelta
    /// al momento de encolar).
    DirectMedia,
    /// Referencia de catálogo (nombre + artista); se resuelve recién al
    /// llegar al frente de la cola.
    Catalog,
}

/// Un item de la cola de reproducción.
///
/// Inmutable salvo los campos de resolución (`url`, `duration_secs`,
/// `uploader`), que muta exactamente una vez `apply_resolution` cuando el
/// resolver encuentra el stream.
#[derive(Debug, Clone)]
pub struct Track {
    pub title: String,
    pub artist: String,
    /// Frase con la que el resolver buscará el stream (solo origen catálogo).
    pub search_query: String,
    /// URL canónica del medio; ausente hasta resolver.
    pub url: Option<String>,
    pub origin: TrackOrigin,
    pub requested_by: Option<UserId>,
    pub duration_secs: u64,
    pub uploader: String,
    needs_resolution: bool,
}

impl Track {
    /// Track con medio ya resuelto (URL directa o resultado de búsqueda).
    pub fn from_media_url(
        title: impl Into<String>,
        url: impl Into<String>,
        uploader: impl Into<String>,
        duration_secs: u64,
    ) -> Self {
        let title = title.into();
        let uploader = uploader.into();
        Self {
            artist: uploader.clone(),
            search_query: title.clone(),
            title,
            url: Some(url.into()),
            origin: TrackOrigin::DirectMedia,
            requested_by: None,
            duration_secs,
            uploader,
            needs_resolution: false,
        }
    }

    /// Referencia de catálogo pendiente de resolución.
    pub fn from_catalog(
        name: impl Into<String>,
        artist: impl Into<String>,
        requested_by: Option<UserId>,
    ) -> Self {
        let name = name.into();
        let artist = artist.into();
        Self {
            search_query: format!("{} {}", artist, name),
            title: name,
            uploader: artist.clone(),
            artist,
            url: None,
            origin: TrackOrigin::Catalog,
            requested_by,
            duration_secs: 0,
            needs_resolution: true,
        }
    }

    pub fn with_requested_by(mut self, user_id: UserId) -> Self {
        self.requested_by = Some(user_id);
        self
    }

    pub fn needs_resolution(&self) -> bool {
        self.needs_resolution
    }

    /// Completa los campos de resolución. Debe llamarse a lo sumo una vez,
    /// solo desde el paso de resolución del player.
    pub fn apply_resolution(&mut self, info: &StreamInfo) {
        debug_assert!(self.needs_resolution, "track ya resuelto");

        self.url = Some(info.url.clone());
        if let Some(duration) = info.duration_secs {
            self.duration_secs = duration;
        }
        if let Some(uploader) = &info.uploader {
            self.uploader = uploader.clone();
        }
        self.needs_resolution = false;
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_media_track_is_already_resolved() {
        let track = Track::from_media_url(
            "Never Gonna Give You Up",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "Rick Astley",
            213,
        );

        assert!(!track.needs_resolution());
        assert_eq!(track.origin, TrackOrigin::DirectMedia);
        assert_eq!(
            track.url.as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
        assert_eq!(track.duration_secs, 213);
    }

    #[test]
    fn test_catalog_track_needs_resolution_until_applied() {
        let mut track = Track::from_catalog("Song Y", "Artist X", None);

        assert!(track.needs_resolution());
        assert_eq!(track.origin, TrackOrigin::Catalog);
        assert_eq!(track.url, None);
        assert_eq!(track.search_query, "Artist X Song Y");

        track.apply_resolution(&StreamInfo {
            title: "Song Y (Official Video)".to_string(),
            url: "https://youtu.be/abc123".to_string(),
            uploader: Some("Artist X Oficial".to_string()),
            duration_secs: Some(187),
        });

        assert!(!track.needs_resolution());
        assert_eq!(track.url.as_deref(), Some("https://youtu.be/abc123"));
        assert_eq!(track.uploader, "Artist X Oficial");
        assert_eq!(track.duration_secs, 187);
        // El display no cambia con la resolución
        assert_eq!(track.to_string(), "Artist X - Song Y");
    }

    #[test]
    fn test_display_format() {
        let track = Track::from_catalog("Bohemian Rhapsody", "Queen", None);
        assert_eq!(track.to_string(), "Queen - Bohemian Rhapsody");
    }
}

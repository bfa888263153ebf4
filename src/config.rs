use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Spotify (opcional - sin credenciales el catálogo queda deshabilitado)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,

    // Cola
    pub max_queue_size: usize,
    pub max_playlist_size: usize,

    // Reproducción
    pub default_volume: f32,
    pub resolve_timeout_secs: u64,
    pub max_consecutive_skips: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Spotify
            spotify_client_id: std::env::var("SPOTIFY_CLIENT_ID")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            spotify_client_secret: std::env::var("SPOTIFY_CLIENT_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),

            // Cola
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            max_playlist_size: std::env::var("MAX_PLAYLIST_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,

            // Reproducción
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            resolve_timeout_secs: std::env::var("RESOLVE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            max_consecutive_skips: std::env::var("MAX_CONSECUTIVE_SKIPS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Valida los valores de configuración antes de arrancar el bot.
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN no puede estar vacío");
        }

        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!(
                "Default volume must be between 0.0 and 2.0, got: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.resolve_timeout_secs == 0 {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        // Las credenciales de Spotify van en pareja
        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("SPOTIFY_CLIENT_ID y SPOTIFY_CLIENT_SECRET deben configurarse juntos");
        }

        Ok(())
    }

    pub fn spotify_enabled(&self) -> bool {
        self.spotify_client_id.is_some() && self.spotify_client_secret.is_some()
    }

    /// Resumen seguro para logging (sin tokens).
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Spotify: {}\n  \
            Cola: {} máx, playlists hasta {}\n  \
            Reproducción: {}% vol, timeout {}s, {} saltos consecutivos máx",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            if self.spotify_enabled() {
                "habilitado"
            } else {
                "deshabilitado"
            },
            self.max_queue_size,
            self.max_playlist_size,
            (self.default_volume * 100.0) as u32,
            self.resolve_timeout_secs,
            self.max_consecutive_skips,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,
            spotify_client_id: None,
            spotify_client_secret: None,
            max_queue_size: 100,
            max_playlist_size: 50,
            default_volume: 0.5,
            resolve_timeout_secs: 30,
            max_consecutive_skips: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let mut config = Config::default();
        config.discord_token = "token".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_spotify_credentials_must_be_paired() {
        let mut config = Config::default();
        config.discord_token = "token".to_string();
        config.spotify_client_id = Some("id".to_string());
        assert!(config.validate().is_err());

        config.spotify_client_secret = Some("secret".to_string());
        assert!(config.validate().is_ok());
        assert!(config.spotify_enabled());
    }

    #[test]
    fn test_zero_queue_size_rejected() {
        let mut config = Config::default();
        config.discord_token = "token".to_string();
        config.max_queue_size = 0;
        assert!(config.validate().is_err());
    }
}

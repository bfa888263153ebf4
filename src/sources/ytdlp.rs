use std::future::Future;
use std::time::Duration;

use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{PlaybackSource, SourceError, StreamInfo, StreamResolver};

const MAX_MATERIALIZE_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Marca una frase de texto libre como búsqueda (primer resultado).
pub fn search_reference(text: &str) -> String {
    format!("ytsearch1:{}", text)
}

/// true si el input ya es una URL http(s) y no hace falta el marcador.
pub fn is_media_url(input: &str) -> bool {
    match url::Url::parse(input) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Una configuración de extracción de yt-dlp. Las estrategias se prueban
/// en orden; solo la detección de bot justifica pasar a la siguiente.
struct ExtractionStrategy {
    name: &'static str,
    extra_args: &'static [&'static str],
}

const STRATEGIES: &[ExtractionStrategy] = &[
    ExtractionStrategy {
        name: "estándar",
        extra_args: &[],
    },
    ExtractionStrategy {
        name: "huella reducida",
        extra_args: &[
            "--user-agent",
            "Mozilla/5.0 (Linux; Android 11; SM-A515F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Mobile Safari/537.36",
            "--extractor-args",
            "youtube:player_client=android_embedded,ios",
            "--extractor-args",
            "youtube:skip=dash,hls",
        ],
    },
];

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    duration: Option<f64>,
    uploader: Option<String>,
    webpage_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Resolver sobre yt-dlp en subproceso.
pub struct YtDlpResolver {
    timeout_secs: u64,
}

impl YtDlpResolver {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    /// Verifica que yt-dlp esté instalado y pueda ejecutarse.
    pub async fn verify_available() -> Result<String, SourceError> {
        let output = Command::new("yt-dlp")
            .arg("--version")
            .output()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(SourceError::Unavailable(
                "yt-dlp no puede ejecutarse correctamente".to_string(),
            ))
        }
    }

    /// Ejecuta yt-dlp con timeout del lado del caller y clasifica el fallo
    /// en el límite del subproceso. Más arriba nadie vuelve a mirar texto
    /// de errores.
    async fn run_ytdlp(&self, query: &str, args: Vec<String>) -> Result<String, SourceError> {
        let result = timeout(
            Duration::from_secs(self.timeout_secs),
            Command::new("yt-dlp").args(&args).output(),
        )
        .await
        .map_err(|_| SourceError::Timeout(self.timeout_secs))?;

        let output = result.map_err(|e| SourceError::Unavailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(query, &stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn fetch_info(
        &self,
        query: &str,
        strategy: &ExtractionStrategy,
    ) -> Result<StreamInfo, SourceError> {
        let mut args: Vec<String> = vec![
            "--no-playlist".to_string(),
            "--dump-json".to_string(),
            "--skip-download".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(strategy.extra_args.iter().map(|s| s.to_string()));
        args.push(query.to_string());

        let stdout = self.run_ytdlp(query, args).await?;

        // Con búsquedas multi-resultado yt-dlp emite un JSON por línea;
        // gana el primero, sin heurísticas de ranking.
        let line = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| SourceError::NotFound(query.to_string()))?;

        let info: YtDlpInfo = serde_json::from_str(line)
            .map_err(|e| SourceError::Extraction(format!("respuesta inválida de yt-dlp: {}", e)))?;

        let url = info
            .webpage_url
            .or(info.url)
            .ok_or_else(|| SourceError::Extraction("resultado sin URL".to_string()))?;

        Ok(StreamInfo {
            title: info.title,
            url,
            uploader: info.uploader,
            duration_secs: info.duration.map(|d| d as u64),
        })
    }

    async fn fetch_stream_url(&self, url: &str) -> Result<PlaybackSource, SourceError> {
        let args: Vec<String> = vec![
            "--no-playlist".to_string(),
            "-f".to_string(),
            "bestaudio/best".to_string(),
            "--get-url".to_string(),
            "--no-warnings".to_string(),
            url.to_string(),
        ];

        let stdout = self.run_ytdlp(url, args).await?;
        let stream_url = stdout.trim().to_string();

        if stream_url.is_empty() {
            return Err(SourceError::Extraction(
                "no se pudo obtener URL de stream".to_string(),
            ));
        }

        Ok(PlaybackSource { stream_url })
    }
}

#[async_trait]
impl StreamResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<StreamInfo, SourceError> {
        let mut last_err = None;

        for (i, strategy) in STRATEGIES.iter().enumerate() {
            debug!(
                "🔍 Estrategia de extracción {} ({}) para: {}",
                i + 1,
                strategy.name,
                query
            );

            match self.fetch_info(query, strategy).await {
                Ok(stream) => {
                    info!("✅ Resuelto '{}' con estrategia {}", query, strategy.name);
                    return Ok(stream);
                }
                Err(e) if e.is_bot_detection() => {
                    warn!(
                        "🤖 Detección de bot con estrategia {} para '{}': {}",
                        strategy.name, query, e
                    );
                    last_err = Some(e);
                }
                // Cualquier otro fallo es terminal: cambiar de estrategia
                // no va a arreglar un video inexistente.
                Err(e) => return Err(e),
            }
        }

        Err(last_err
            .unwrap_or_else(|| SourceError::Extraction("sin estrategias disponibles".to_string())))
    }

    async fn materialize(&self, url: &str) -> Result<PlaybackSource, SourceError> {
        with_bot_detection_retry(MAX_MATERIALIZE_ATTEMPTS, RETRY_BASE_DELAY, || {
            self.fetch_stream_url(url)
        })
        .await
    }
}

/// Clasifica el stderr de yt-dlp en un `SourceError` tipado. Única función
/// que mira el texto del error.
fn classify_failure(query: &str, stderr: &str) -> SourceError {
    let lowered = stderr.to_lowercase();

    if lowered.contains("sign in to confirm")
        || lowered.contains("not a bot")
        || lowered.contains("captcha")
    {
        SourceError::BotDetection(first_line(stderr))
    } else if lowered.contains("did not match any videos")
        || lowered.contains("no video results")
        || lowered.contains("video unavailable")
        || lowered.contains("404")
    {
        SourceError::NotFound(query.to_string())
    } else {
        SourceError::Extraction(first_line(stderr))
    }
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or("").trim().to_string()
}

/// Reintenta `op` con backoff exponencial, solo para fallos clasificados
/// como detección de bot; el resto corta de inmediato.
async fn with_bot_detection_retry<T, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_bot_detection() && attempt < max_attempts => {
                let delay = base_delay * 2u32.pow(attempt - 1);
                warn!(
                    "🤖 Detección de bot (intento {}/{}), reintentando en {:?}",
                    attempt, max_attempts, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

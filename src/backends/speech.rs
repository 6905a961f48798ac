//! Text-to-speech backend.

use crate::config::BackendsConfig;
use crate::error::{Error, Result};
use crate::render::tools::media_duration;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Which speech engine drives narration synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AudioEngine {
    /// Hosted TTS HTTP service.
    #[default]
    Tts,
    /// Voice-cloning service behind the same wire contract.
    Cloned,
}

impl AudioEngine {
    /// Audio container the engine produces.
    pub fn file_extension(&self) -> &'static str {
        match self {
            AudioEngine::Tts => "mp3",
            AudioEngine::Cloned => "wav",
        }
    }
}

/// Result of one synthesis call.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    /// Measured duration in seconds; 0.0 when measurement failed.
    pub duration: f64,
}

#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesizedAudio>;
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    voice: &'a str,
}

/// Client for a TTS HTTP endpoint returning raw audio bytes.
///
/// The service does not report durations, so the synthesized file is
/// measured with ffprobe after download; a failed probe degrades to 0.0 and
/// leaves the planned scene duration in force.
pub struct TtsHttpClient {
    client: reqwest::Client,
    base_url: String,
    scratch_dir: std::path::PathBuf,
}

impl TtsHttpClient {
    pub fn new(config: &BackendsConfig, scratch_dir: impl AsRef<Path>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.speech_url.trim_end_matches('/').to_string(),
            scratch_dir: scratch_dir.as_ref().to_path_buf(),
        })
    }

    async fn measure(&self, bytes: &[u8]) -> f64 {
        // ffprobe wants a file; stage the payload in the scratch dir.
        let probe_target = self
            .scratch_dir
            .join(format!("probe-{}.bin", uuid::Uuid::new_v4()));

        let duration = async {
            tokio::fs::create_dir_all(&self.scratch_dir).await?;
            tokio::fs::write(&probe_target, bytes).await?;
            media_duration(&probe_target).await
        }
        .await;

        let _ = tokio::fs::remove_file(&probe_target).await;

        match duration {
            Ok(secs) => secs,
            Err(e) => {
                warn!("Failed to measure synthesized audio: {e}");
                0.0
            }
        }
    }
}

#[async_trait]
impl SpeechBackend for TtsHttpClient {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesizedAudio> {
        let url = format!("{}/tts", self.base_url);
        debug!("tts: {} chars, voice {voice}", text.len());

        let response = self
            .client
            .post(&url)
            .json(&TtsRequest { text, voice })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::external(
                "speech",
                format!("tts returned {}", response.status()),
            ));
        }

        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(Error::external("speech", "tts returned an empty payload"));
        }

        let duration = self.measure(&bytes).await;
        Ok(SynthesizedAudio { bytes, duration })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(url: &str) -> BackendsConfig {
        BackendsConfig {
            speech_url: url.to_string(),
            request_timeout_secs: 5,
            ..BackendsConfig::default()
        }
    }

    #[tokio::test]
    async fn returns_payload_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tts"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"audio-bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = TtsHttpClient::new(&test_config(&server.uri()), dir.path()).unwrap();
        let audio = client.synthesize("hello there", "default").await.unwrap();
        assert_eq!(audio.bytes, b"audio-bytes");
        // Without ffprobe on a junk payload the measurement degrades to 0.
        assert!(audio.duration >= 0.0);
    }

    #[tokio::test]
    async fn empty_payload_is_a_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tts"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = TtsHttpClient::new(&test_config(&server.uri()), dir.path()).unwrap();
        let err = client.synthesize("hello", "default").await.unwrap_err();
        assert!(matches!(err, Error::ExternalService { .. }));
    }

    #[tokio::test]
    async fn non_success_status_is_a_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tts"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = TtsHttpClient::new(&test_config(&server.uri()), dir.path()).unwrap();
        let err = client.synthesize("hello", "default").await.unwrap_err();
        assert!(matches!(err, Error::ExternalService { .. }));
    }

    #[test]
    fn engine_extensions() {
        assert_eq!(AudioEngine::Tts.file_extension(), "mp3");
        assert_eq!(AudioEngine::Cloned.file_extension(), "wav");
    }
}

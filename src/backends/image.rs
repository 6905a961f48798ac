//! Text-to-image backend.

use crate::config::BackendsConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Parameters for one image generation.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f64,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, negative_prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: negative_prompt.into(),
            width: 1344,
            height: 768,
            steps: 25,
            cfg_scale: 7.0,
        }
    }
}

#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Generate one image, returning the raw encoded bytes.
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>>;
}

/// Client for an SD-WebUI compatible `txt2img` endpoint.
pub struct SdWebuiClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct Txt2ImgResponse {
    images: Vec<String>,
}

impl SdWebuiClient {
    pub fn new(config: &BackendsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.image_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageBackend for SdWebuiClient {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>> {
        let url = format!("{}/sdapi/v1/txt2img", self.base_url);
        debug!("txt2img: {} steps, {}x{}", request.steps, request.width, request.height);

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(Error::external(
                "image",
                format!("txt2img returned {}", response.status()),
            ));
        }

        let body: Txt2ImgResponse = response.json().await?;
        let encoded = body
            .images
            .first()
            .ok_or_else(|| Error::external("image", "txt2img returned no images"))?;

        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::parse("image", format!("invalid base64 payload: {e}")))
    }
}

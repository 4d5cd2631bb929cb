// crates/core/src/image.rs
//! Image-synthesis client for the `generating_image` stage.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("image service returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// Seam for the image-synthesis service. Returns a hosted URL for the
/// generated image.
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    async fn synthesize(&self, prompt: &str) -> Result<String, ImageError>;
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    url: String,
}

/// HTTP implementation against the image-synthesis service.
pub struct HttpImageSynthesizer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpImageSynthesizer {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ImageSynthesizer for HttpImageSynthesizer {
    async fn synthesize(&self, prompt: &str) -> Result<String, ImageError> {
        let url = format!("{}/v1/images", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&SynthesizeRequest { prompt })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ImageError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<SynthesizeResponse>().await?.url)
    }
}

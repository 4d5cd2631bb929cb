// crates/core/src/scene.rs
//! Content-shaping client for the `orchestrating` stage.
//!
//! Shapes a raw concept into a scene brief (summary, ambience, points of
//! interest) used to enrich the world-generation prompt. This service is not
//! on the critical path of asset delivery: callers degrade to an empty
//! placeholder brief when it is unreachable.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use worldsmith_types::Quality;

/// Shaped scene description returned by the content service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneBrief {
    /// One-paragraph shaped description of the scene.
    #[serde(default)]
    pub summary: String,
    /// Mood/soundscape hint.
    #[serde(default)]
    pub ambience: Option<String>,
    /// Named locations worth placing in the world.
    #[serde(default)]
    pub points_of_interest: Vec<String>,
}

impl SceneBrief {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("scene request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("scene service returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// Seam for the content-shaping service.
#[async_trait]
pub trait SceneDirector: Send + Sync {
    async fn shape(&self, concept: &str, quality: Quality) -> Result<SceneBrief, SceneError>;
}

#[derive(Debug, Serialize)]
struct ShapeRequest<'a> {
    concept: &'a str,
    quality: &'a str,
}

/// HTTP implementation against the content service.
pub struct HttpSceneDirector {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSceneDirector {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SceneDirector for HttpSceneDirector {
    async fn shape(&self, concept: &str, quality: Quality) -> Result<SceneBrief, SceneError> {
        let url = format!("{}/v1/scenes", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ShapeRequest {
                concept,
                quality: quality.as_str(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(SceneError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<SceneBrief>().await?)
    }
}

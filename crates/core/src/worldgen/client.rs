// crates/core/src/worldgen/client.rs
//! HTTP client for the world-generation service.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use super::types::{
    ImageRef, OperationHandle, OperationResponse, OperationStatus, SubmitResponse, UploadTicket,
};
use super::WorldGenError;

/// The five protocol operations the orchestrator drives.
///
/// The bounded poll loop and the eventual-consistency retry loop live in the
/// orchestrator, not here, so the cancellation flag is consulted between
/// iterations; each method is a single request.
#[async_trait]
pub trait WorldGenApi: Send + Sync {
    /// Request a signed upload target for a named source asset.
    async fn prepare_upload(&self, filename: &str) -> Result<UploadTicket, WorldGenError>;

    /// Transfer raw bytes to the ticket's destination with its required
    /// headers.
    async fn upload_asset(
        &self,
        ticket: &UploadTicket,
        data: Bytes,
        mime: &str,
    ) -> Result<(), WorldGenError>;

    /// Submit a generation request; returns the operation handle to poll.
    async fn submit_generation(
        &self,
        image: &ImageRef,
        prompt: &str,
    ) -> Result<OperationHandle, WorldGenError>;

    /// Fetch the operation's current status once.
    async fn poll_operation(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, WorldGenError>;

    /// Fetch the result resource document once. Asset fields may not be
    /// populated yet right after the operation reports done.
    async fn fetch_world(&self, world_id: &str) -> Result<Value, WorldGenError>;
}

/// reqwest implementation of [`WorldGenApi`].
pub struct WorldGenClient {
    client: reqwest::Client,
    base_url: String,
}

impl WorldGenClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, WorldGenError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(WorldGenError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl WorldGenApi for WorldGenClient {
    async fn prepare_upload(&self, filename: &str) -> Result<UploadTicket, WorldGenError> {
        let url = format!("{}/v2/uploads", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "filename": filename }))
            .send()
            .await?;
        Ok(Self::check(response).await?.json::<UploadTicket>().await?)
    }

    async fn upload_asset(
        &self,
        ticket: &UploadTicket,
        data: Bytes,
        mime: &str,
    ) -> Result<(), WorldGenError> {
        let mut request = self
            .client
            .put(&ticket.upload_url)
            .header("content-type", mime);
        for (name, value) in &ticket.headers {
            request = request.header(name, value);
        }
        let response = request.body(data).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn submit_generation(
        &self,
        image: &ImageRef,
        prompt: &str,
    ) -> Result<OperationHandle, WorldGenError> {
        let url = format!("{}/v2/generations", self.base_url);
        let body = match image {
            ImageRef::AssetId(id) => serde_json::json!({
                "image_asset_id": id,
                "prompt": prompt,
            }),
            ImageRef::Url(image_url) => serde_json::json!({
                "image_url": image_url,
                "prompt": prompt,
            }),
        };
        let response = self.client.post(&url).json(&body).send().await?;
        let submit = Self::check(response).await?.json::<SubmitResponse>().await?;
        Ok(OperationHandle(submit.operation_id))
    }

    async fn poll_operation(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, WorldGenError> {
        let url = format!("{}/v2/operations/{}", self.base_url, handle);
        let response = self.client.get(&url).send().await?;
        let op = Self::check(response).await?.json::<OperationResponse>().await?;

        if op.status != "done" {
            return Ok(OperationStatus::Pending);
        }
        Ok(OperationStatus::Done {
            error: op.error.map(|e| e.message),
            world_id: op.result.map(|r| r.world_id),
        })
    }

    async fn fetch_world(&self, world_id: &str) -> Result<Value, WorldGenError> {
        let url = format!("{}/v2/worlds/{}", self.base_url, world_id);
        let response = self.client.get(&url).send().await?;
        Ok(Self::check(response).await?.json::<Value>().await?)
    }
}

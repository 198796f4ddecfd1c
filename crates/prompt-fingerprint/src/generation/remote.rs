use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::{build_client, ensure_ok, read_image, GenerationStrategy, DEFAULT_CONNECT_TIMEOUT};
use crate::types::FingerprintResult;

/// Hosted Stable Diffusion XL inference endpoint.
pub const DEFAULT_REMOTE_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/stabilityai/stable-diffusion-xl-base-1.0";

/// Settings for the hosted inference backend.
#[derive(Debug)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub api_token: SecretString,
    pub connect_timeout: Duration,
    /// Overall deadline per request; `None` waits until the server answers.
    pub request_timeout: Option<Duration>,
}

impl RemoteConfig {
    /// Default endpoint and timeouts with the given bearer token.
    pub fn new(api_token: SecretString) -> Self {
        Self {
            endpoint: DEFAULT_REMOTE_ENDPOINT.to_string(),
            api_token,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Single-phase backend: one authenticated POST answered with image bytes.
pub struct RemoteApiStrategy {
    client: Client,
    config: RemoteConfig,
}

impl RemoteApiStrategy {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: build_client(config.connect_timeout, config.request_timeout),
            config,
        }
    }
}

/// Wire format for the inference request.
#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

#[async_trait]
impl GenerationStrategy for RemoteApiStrategy {
    async fn try_generate(&self, prompt: &str) -> FingerprintResult<DynamicImage> {
        tracing::debug!(backend = "remote", endpoint = %self.config.endpoint, "sending inference request");

        let response = self
            .client
            .post(&self.config.endpoint)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_token.expose_secret()),
            )
            .json(&InferenceRequest { inputs: prompt })
            .send()
            .await?;

        ensure_ok(&response, self.name(), "inference")?;
        read_image(response).await
    }

    fn name(&self) -> &str {
        "remote"
    }
}

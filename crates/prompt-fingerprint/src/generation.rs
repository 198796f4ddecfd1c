//! Image generation backends.

pub(crate) mod local;
pub(crate) mod remote;

use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use reqwest::{Client, Response, StatusCode};

use crate::decode::decode_image;
use crate::types::{FingerprintError, FingerprintResult};

pub use local::{LocalApiStrategy, LocalConfig, DEFAULT_LOCAL_BASE_URL};
pub use remote::{RemoteApiStrategy, RemoteConfig, DEFAULT_REMOTE_ENDPOINT};

/// Connect timeout shared by every backend.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A backend that turns a prompt into an image.
#[async_trait]
pub trait GenerationStrategy: Send + Sync {
    /// Generate an image, surfacing why it failed.
    async fn try_generate(&self, prompt: &str) -> FingerprintResult<DynamicImage>;

    /// Backend name used in logs and descriptions.
    fn name(&self) -> &str;

    /// Generate an image, or `None` on any transport, status, or payload failure.
    async fn generate_image(&self, prompt: &str) -> Option<DynamicImage> {
        match self.try_generate(prompt).await {
            Ok(img) => Some(img),
            Err(e) => {
                tracing::warn!(backend = self.name(), error = %e, "image generation produced no image");
                None
            }
        }
    }
}

/// Build the transport client for a backend.
fn build_client(connect_timeout: Duration, request_timeout: Option<Duration>) -> Client {
    let mut builder = Client::builder().connect_timeout(connect_timeout);
    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().unwrap_or_default()
}

/// Reject anything but HTTP 200, logging the status.
fn ensure_ok(response: &Response, backend: &str, phase: &'static str) -> FingerprintResult<()> {
    let status = response.status();
    if status != StatusCode::OK {
        tracing::error!(
            backend,
            phase,
            status = status.as_u16(),
            "image backend returned non-success status"
        );
        return Err(FingerprintError::Status {
            phase,
            status: status.as_u16(),
        });
    }
    Ok(())
}

/// Decode a 200 response body as an image.
async fn read_image(response: Response) -> FingerprintResult<DynamicImage> {
    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes().await?;
    decode_image(&bytes, mime.as_deref())
}

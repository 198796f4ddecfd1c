use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use super::{build_client, ensure_ok, read_image, GenerationStrategy, DEFAULT_CONNECT_TIMEOUT};
use crate::types::{FingerprintError, FingerprintResult};

/// Where a self-hosted generation server listens by default.
pub const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:8000";

/// Settings for a self-hosted generation server.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub base_url: String,
    pub model_name: String,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub connect_timeout: Duration,
    pub request_timeout: Option<Duration>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LOCAL_BASE_URL.to_string(),
            model_name: "stable".to_string(),
            num_inference_steps: 50,
            guidance_scale: 7.5,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
        }
    }
}

impl LocalConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Two-phase backend: submit the prompt, then download the file the server wrote.
///
/// Both phases go through the same client. A failed submit never triggers
/// a download, and neither phase is retried.
pub struct LocalApiStrategy {
    client: Client,
    config: LocalConfig,
}

impl LocalApiStrategy {
    pub fn new(config: LocalConfig) -> Self {
        Self {
            client: build_client(config.connect_timeout, config.request_timeout),
            config,
        }
    }

    /// `<base>/<segments...>`, percent-encoding each segment.
    fn url(&self, segments: &[&str]) -> FingerprintResult<Url> {
        let mut url = Url::parse(&self.config.base_url).map_err(|e| {
            FingerprintError::InvalidInput(format!("Invalid base URL {}: {e}", self.config.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                FingerprintError::InvalidInput(format!(
                    "Base URL cannot carry a path: {}",
                    self.config.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn submit(&self, prompt: &str) -> FingerprintResult<String> {
        let url = self.url(&["images", "generate", ""])?;
        let body = GenerateRequest {
            model_name: &self.config.model_name,
            prompt,
            num_inference_steps: self.config.num_inference_steps,
            guidance_scale: self.config.guidance_scale,
        };

        tracing::debug!(backend = "local", %url, "submitting generation request");
        let response = self.client.post(url).json(&body).send().await?;
        ensure_ok(&response, self.name(), "generate")?;

        let bytes = response.bytes().await?;
        let parsed: GenerateResponse = serde_json::from_slice(&bytes).map_err(|e| {
            FingerprintError::MalformedResponse(format!("generate response: {e}"))
        })?;
        image_file_name(&parsed.image_path).map(str::to_string)
    }

    async fn download(&self, file_name: &str) -> FingerprintResult<DynamicImage> {
        let url = self.url(&["images", "download", file_name])?;

        tracing::debug!(backend = "local", %url, "downloading generated image");
        let response = self.client.get(url).send().await?;
        ensure_ok(&response, self.name(), "download")?;
        read_image(response).await
    }
}

/// Wire format for the submit phase.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model_name: &'a str,
    prompt: &'a str,
    num_inference_steps: u32,
    guidance_scale: f64,
}

#[derive(Deserialize)]
struct GenerateResponse {
    image_path: String,
}

/// The bare file name after the last path separator.
fn image_file_name(image_path: &str) -> FingerprintResult<&str> {
    let name = image_path.rsplit(['/', '\\']).next().unwrap_or_default();
    if name.is_empty() {
        return Err(FingerprintError::MalformedResponse(format!(
            "image_path has no file name: {image_path:?}"
        )));
    }
    Ok(name)
}

#[async_trait]
impl GenerationStrategy for LocalApiStrategy {
    async fn try_generate(&self, prompt: &str) -> FingerprintResult<DynamicImage> {
        let file_name = self.submit(prompt).await?;
        self.download(&file_name).await
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_file_name() {
        assert_eq!(image_file_name("/tmp/out/abc123.png").unwrap(), "abc123.png");
        assert_eq!(image_file_name("abc123.png").unwrap(), "abc123.png");
        assert_eq!(image_file_name("C:\\out\\img.png").unwrap(), "img.png");
        assert!(image_file_name("/tmp/out/").is_err());
        assert!(image_file_name("").is_err());
    }

    #[test]
    fn test_urls() {
        let strategy = LocalApiStrategy::new(LocalConfig::default().with_base_url("http://host:9000/"));
        assert_eq!(
            strategy.url(&["images", "generate", ""]).unwrap().as_str(),
            "http://host:9000/images/generate/"
        );
        assert_eq!(
            strategy.url(&["images", "download", "a b.png"]).unwrap().as_str(),
            "http://host:9000/images/download/a%20b.png"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let strategy = LocalApiStrategy::new(LocalConfig::default().with_base_url("not a url"));
        assert!(matches!(
            strategy.url(&["images"]),
            Err(FingerprintError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_request_body_escapes_quotes() {
        let body = GenerateRequest {
            model_name: "stable",
            prompt: "a \"red\" fox",
            num_inference_steps: 50,
            guidance_scale: 7.5,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains(r#""prompt":"a \"red\" fox""#));
        let back: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back["prompt"], "a \"red\" fox");
        assert_eq!(back["guidance_scale"], 7.5);
    }
}

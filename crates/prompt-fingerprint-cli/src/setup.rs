//! Build backends and extraction pipelines from resolved settings.

use secrecy::{ExposeSecret, SecretString};

use prompt_fingerprint::{
    ClipExtractor, ExtractionPipeline, GenerationStrategy, LocalApiStrategy, LocalConfig,
    LumaGridExtractor, RemoteApiStrategy, RemoteConfig, SingleColorExtractor,
};

use crate::config::{Backend, ExtractorKind, Settings, ENV_TOKEN};

/// The configured generation backend.
pub fn build_strategy(settings: &Settings) -> anyhow::Result<Box<dyn GenerationStrategy>> {
    match settings.backend {
        Backend::Remote => {
            let Some(token) = settings.token.as_ref() else {
                anyhow::bail!("The remote backend needs an API token (--token or {ENV_TOKEN})");
            };
            let token = SecretString::from(token.expose_secret().to_owned());
            let mut config = RemoteConfig::new(token).with_endpoint(settings.endpoint.clone());
            config.request_timeout = settings.timeout;
            tracing::info!("Backend: remote ({})", config.endpoint);
            Ok(Box::new(RemoteApiStrategy::new(config)))
        }
        Backend::Local => {
            let mut config = LocalConfig::default().with_base_url(settings.local_url.clone());
            config.request_timeout = settings.timeout;
            tracing::info!("Backend: local ({})", config.base_url);
            Ok(Box::new(LocalApiStrategy::new(config)))
        }
    }
}

/// The configured extractors, in order. Defaults to a single colour descriptor.
pub fn build_pipeline(settings: &Settings) -> anyhow::Result<ExtractionPipeline> {
    let kinds: &[ExtractorKind] = if settings.extractors.is_empty() {
        &[ExtractorKind::SingleColor]
    } else {
        &settings.extractors
    };

    let mut pipeline = ExtractionPipeline::new();
    for kind in kinds {
        match kind {
            ExtractorKind::SingleColor => pipeline.push(Box::new(SingleColorExtractor)),
            ExtractorKind::LumaGrid => pipeline.push(Box::new(LumaGridExtractor)),
            ExtractorKind::Clip => {
                let clip = ClipExtractor::new(settings.model.as_deref())?;
                pipeline.push(Box::new(clip));
            }
        }
    }
    tracing::debug!("Extraction pipeline: {pipeline:?}");
    Ok(pipeline)
}

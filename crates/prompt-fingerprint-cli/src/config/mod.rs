//! Configuration loading and resolution.
//!
//! Every setting resolves as: explicit flag, then environment variable, then default.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use secrecy::SecretString;

use prompt_fingerprint::generation::{DEFAULT_LOCAL_BASE_URL, DEFAULT_REMOTE_ENDPOINT};

pub const ENV_BACKEND: &str = "PROMPT_FP_BACKEND";
pub const ENV_ENDPOINT: &str = "PROMPT_FP_ENDPOINT";
pub const ENV_LOCAL_URL: &str = "PROMPT_FP_LOCAL_URL";
pub const ENV_TOKEN: &str = "HF_API_TOKEN";
pub const ENV_STORE: &str = "PROMPT_FP_STORE";
pub const ENV_MODEL: &str = "PROMPT_FP_MODEL";

/// Which generation backend to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Hosted inference API (single POST, bearer token).
    Remote,
    /// Self-hosted server (submit, then download).
    Local,
}

/// Which sub-descriptors to extract, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExtractorKind {
    SingleColor,
    LumaGrid,
    Clip,
}

/// Fully resolved settings for one invocation.
#[derive(Debug)]
pub struct Settings {
    pub backend: Backend,
    pub endpoint: String,
    pub local_url: String,
    pub token: Option<SecretString>,
    pub extractors: Vec<ExtractorKind>,
    pub model: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

/// Pick the first of explicit value, environment value, default.
pub fn resolve_with(explicit: Option<String>, env_value: Option<String>, default: &str) -> String {
    explicit
        .or(env_value.filter(|v| !v.is_empty()))
        .unwrap_or_else(|| default.to_string())
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

pub fn resolve_backend(explicit: Option<Backend>) -> anyhow::Result<Backend> {
    if let Some(b) = explicit {
        return Ok(b);
    }
    match env(ENV_BACKEND).filter(|v| !v.is_empty()) {
        Some(v) => Backend::from_str(&v, true)
            .map_err(|e| anyhow::anyhow!("Invalid {ENV_BACKEND} value {v:?}: {e}")),
        None => Ok(Backend::Remote),
    }
}

pub fn resolve_endpoint(explicit: Option<String>) -> String {
    resolve_with(explicit, env(ENV_ENDPOINT), DEFAULT_REMOTE_ENDPOINT)
}

pub fn resolve_local_url(explicit: Option<String>) -> String {
    resolve_with(explicit, env(ENV_LOCAL_URL), DEFAULT_LOCAL_BASE_URL)
}

pub fn resolve_token(explicit: Option<String>) -> Option<SecretString> {
    explicit
        .or_else(|| env(ENV_TOKEN))
        .filter(|t| !t.is_empty())
        .map(SecretString::from)
}

pub fn resolve_model_path(explicit: Option<String>) -> Option<PathBuf> {
    explicit.or_else(|| env(ENV_MODEL)).map(PathBuf::from)
}

/// Store for `generate`: flag, then environment. No default, so
/// `generate` persists nothing unless a store is configured.
pub fn resolve_generate_store_path(explicit: Option<&str>) -> Option<PathBuf> {
    optional_store_path(explicit, env(ENV_STORE))
}

fn optional_store_path(explicit: Option<&str>, env_value: Option<String>) -> Option<PathBuf> {
    explicit
        .map(PathBuf::from)
        .or_else(|| env_value.filter(|v| !v.is_empty()).map(PathBuf::from))
}

/// Resolve the fingerprint store path.
pub fn resolve_store_path(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Some(env_path) = env(ENV_STORE).filter(|v| !v.is_empty()) {
        return PathBuf::from(env_path);
    }

    let cwd_store = PathBuf::from(".pfp/store.pfp");
    if cwd_store.exists() {
        return cwd_store;
    }

    resolve_default_store_path()
}

fn resolve_default_store_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    PathBuf::from(home).join(".prompt-fingerprint").join("store.pfp")
}

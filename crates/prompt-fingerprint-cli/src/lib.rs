//! prompt-fingerprint CLI: configuration, backend wiring, and subcommands.

pub mod commands;
pub mod config;
pub mod setup;

pub use config::{resolve_generate_store_path, resolve_store_path, Backend, ExtractorKind, Settings};

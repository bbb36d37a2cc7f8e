//! Shared types, error model, and configuration for PageDigest.
//!
//! This crate is the foundation depended on by all other PageDigest crates.
//! It provides:
//! - [`PageDigestError`]: the unified error type
//! - Domain types ([`Document`], [`Link`], [`SummaryRequest`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ChunkingConfig, DispatchConfig, FetchConfig, ProviderConfig, SummaryConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, resolve_api_key,
    validate_api_key,
};
pub use error::{PageDigestError, Result};
pub use types::{Document, FailurePolicy, Link, SummaryRequest, Tokenizer};

//! Shared types, error model, and configuration for Researcher.
//!
//! This crate is the foundation depended on by all other Researcher crates.
//! It provides:
//! - [`ResearcherError`], the unified error type
//! - Chat domain types ([`ChatMessage`], [`Role`], [`Exchange`], [`Snippet`])
//! - Configuration ([`AppConfig`], config loading and validation)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, InferenceConfig, OLLAMA_HOST_ENV, SearchConfig, SearchFailurePolicy,
    TemporalConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    normalize_host, validate_config,
};
pub use error::{ResearcherError, Result};
pub use types::{ChatMessage, Exchange, Role, Snippet};

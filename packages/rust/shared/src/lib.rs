//! Shared types, error model, and configuration for AccessCMS.
//!
//! This crate is the foundation depended on by all other AccessCMS crates.
//! It provides:
//! - [`AccessCmsError`] — the unified error type
//! - Domain identifiers ([`EntityId`], [`EntityKind`], [`DisabilityProfile`], [`Provenance`])
//! - Configuration ([`AppConfig`], [`GenerationConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AdaptationConfig, AppConfig, DefaultsConfig, GenerationConfig, config_dir, config_file_path,
    database_path, init_config, load_config, load_config_from, resolve_api_key,
    usable_api_key,
};
pub use error::{AccessCmsError, Result};
pub use types::{DisabilityProfile, EntityId, EntityKind, FallbackReason, Provenance};

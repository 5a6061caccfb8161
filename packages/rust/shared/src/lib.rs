//! Shared types, error model, and configuration for the catalog enricher.
//!
//! This crate is the foundation depended on by all other enricher crates.
//! It provides:
//! - [`EnricherError`]: the unified error type
//! - Domain types ([`ExtraField`], [`FieldKind`], [`AggregatedRecord`], [`PackageDescriptor`], [`RepoRef`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AggregateConfig, AppConfig, HostingConfig, PathsConfig, RegistryConfig, config_dir,
    config_file_path, init_config, init_config_at, load_config, load_config_from, resolve_token,
};
pub use error::{EnricherError, Result};
pub use types::{
    AggregatedRecord, AggregatedSummary, ExtraField, FieldKind, PackageDescriptor, PackageId,
    RepoRef,
};

//! Core enrichment logic for the package catalog.
//!
//! This crate ties the catalog, the field sources, and the store together:
//! per-field fetchers, the sequential orchestrator, and the aggregator that
//! rebuilds the summary consumed downstream.

pub mod aggregator;
pub mod catalog;
pub mod fetchers;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod store;

#[cfg(test)]
mod test_logs;

pub use aggregator::{AggregateReport, aggregate, build_summary};
pub use catalog::{Catalog, TomlCatalog};
pub use fetchers::{FieldFetchers, FieldOutcome};
pub use orchestrator::{EnrichReport, enrich_packages};
pub use pipeline::{RunResult, Selection, run};
pub use progress::{ProgressReporter, SilentProgress};
pub use store::FieldStore;

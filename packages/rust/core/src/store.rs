//! The field store seen by fetchers, the orchestrator, and the aggregator.

use async_trait::async_trait;

use enricher_shared::{AggregatedSummary, ExtraField, FieldKind, Result};
use enricher_storage::Storage;

/// Per-package field persistence plus the aggregated summary slot.
#[async_trait]
pub trait FieldStore: Send + Sync {
    /// Stored value of `kind` for `package_id`, if any.
    async fn get_field(&self, kind: FieldKind, package_id: &str) -> Result<Option<ExtraField>>;

    /// Create or overwrite one field.
    async fn set_field(&self, package_id: &str, field: &ExtraField) -> Result<()>;

    /// Replace the whole aggregated summary in one write.
    async fn set_aggregated(&self, summary: &AggregatedSummary) -> Result<()>;

    /// Start a run record. Stores without run history return `None`.
    async fn begin_run(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Close a run record opened by [`FieldStore::begin_run`].
    async fn finish_run(&self, _run_id: &str, _stats_json: &str) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl FieldStore for Storage {
    async fn get_field(&self, kind: FieldKind, package_id: &str) -> Result<Option<ExtraField>> {
        Storage::get_field(self, kind, package_id).await
    }

    async fn set_field(&self, package_id: &str, field: &ExtraField) -> Result<()> {
        Storage::set_field(self, package_id, field).await
    }

    async fn set_aggregated(&self, summary: &AggregatedSummary) -> Result<()> {
        Storage::set_aggregated(self, summary).await
    }

    async fn begin_run(&self) -> Result<Option<String>> {
        self.insert_run().await.map(Some)
    }

    async fn finish_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        Storage::finish_run(self, run_id, stats_json).await
    }
}

//! Builds the per-package summary from stored fields and replaces it in one
//! write.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use enricher_shared::{
    AggregateConfig, AggregatedRecord, AggregatedSummary, ExtraField, FieldKind, Result,
};

use crate::catalog::Catalog;
use crate::store::FieldStore;

/// Result of an aggregation run.
#[derive(Debug, Clone)]
pub struct AggregateReport {
    /// Records in the written summary.
    pub records: usize,
    pub elapsed: Duration,
}

/// Read the summary for every catalogued package, applying defaults.
///
/// Pure read: nothing is written. Any store or catalog error aborts.
pub async fn build_summary(
    catalog: &dyn Catalog,
    store: &dyn FieldStore,
    config: &AggregateConfig,
) -> Result<AggregatedSummary> {
    let mut summary = AggregatedSummary::new();

    for package_id in catalog.list_all().await? {
        if !catalog.exists(&package_id).await? {
            debug!(package_id = %package_id, "package vanished from catalog, dropping");
            continue;
        }

        let stars = match store.get_field(FieldKind::StarCount, &package_id).await? {
            Some(ExtraField::StarCount(n)) => n,
            _ => 0,
        };
        let runtime_version = match store.get_field(FieldKind::RuntimeVersion, &package_id).await? {
            Some(ExtraField::RuntimeVersion(v)) => v,
            _ => config.baseline_runtime_version.clone(),
        };
        let cover_image_url = match store.get_field(FieldKind::CoverImageUrl, &package_id).await? {
            Some(ExtraField::CoverImageUrl(url)) => Some(url),
            _ => None,
        };
        let updated_time = match store.get_field(FieldKind::UpdatedTime, &package_id).await? {
            Some(ExtraField::UpdatedTime(ms)) => Some(ms),
            _ => None,
        };

        summary.insert(
            package_id,
            AggregatedRecord {
                stars,
                runtime_version,
                cover_image_url,
                updated_time,
            },
        );
    }

    Ok(summary)
}

/// Rebuild the aggregated summary and replace the stored one.
///
/// On error the previously stored summary is left as it was.
#[instrument(skip_all)]
pub async fn aggregate(
    catalog: &dyn Catalog,
    store: &dyn FieldStore,
    config: &AggregateConfig,
) -> Result<AggregateReport> {
    let start = Instant::now();

    let summary = build_summary(catalog, store, config).await?;
    store.set_aggregated(&summary).await?;

    let report = AggregateReport {
        records: summary.len(),
        elapsed: start.elapsed(),
    };
    info!(
        records = report.records,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "aggregation complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TomlCatalog;
    use crate::store::testing::MemoryStore;

    const CATALOG: &str = r#"
[[packages]]
id = "com.foo.bar"
repository = "foo/bar"

[[packages]]
id = "org.empty"
repository = "someone/empty"
"#;

    fn config() -> AggregateConfig {
        AggregateConfig::default()
    }

    #[tokio::test]
    async fn one_record_per_package_with_defaults() {
        let catalog = TomlCatalog::from_toml_str(CATALOG).unwrap();
        let store = MemoryStore::new();

        let summary = build_summary(&catalog, &store, &config()).await.unwrap();

        assert_eq!(summary.len(), 2);
        let empty = &summary["org.empty"];
        assert_eq!(empty.stars, 0);
        assert_eq!(empty.runtime_version, "1.0.0");
        assert_eq!(empty.cover_image_url, None);
        assert_eq!(empty.updated_time, None);
    }

    #[tokio::test]
    async fn stored_fields_are_used_and_readme_is_ignored() {
        let catalog = TomlCatalog::from_toml_str(CATALOG).unwrap();
        let store = MemoryStore::new();
        store.seed("com.foo.bar", ExtraField::StarCount(42)).await;
        store
            .seed("com.foo.bar", ExtraField::RuntimeVersion("2.3".into()))
            .await;
        store
            .seed("com.foo.bar", ExtraField::CoverImageUrl(String::new()))
            .await;
        store
            .seed("com.foo.bar", ExtraField::UpdatedTime(1_700_000_000_000))
            .await;
        store
            .seed("com.foo.bar", ExtraField::ReadmeText("# bar".into()))
            .await;

        let summary = build_summary(&catalog, &store, &config()).await.unwrap();

        assert_eq!(
            summary["com.foo.bar"],
            AggregatedRecord {
                stars: 42,
                runtime_version: "2.3".into(),
                cover_image_url: Some(String::new()),
                updated_time: Some(1_700_000_000_000),
            }
        );
    }

    #[tokio::test]
    async fn baseline_version_is_configurable() {
        let catalog = TomlCatalog::from_toml_str(CATALOG).unwrap();
        let store = MemoryStore::new();
        let config = AggregateConfig {
            baseline_runtime_version: "3.0.0".into(),
        };

        let summary = build_summary(&catalog, &store, &config).await.unwrap();
        assert!(summary.values().all(|r| r.runtime_version == "3.0.0"));
    }

    #[tokio::test]
    async fn removed_packages_are_dropped() {
        let store = MemoryStore::new();
        store.seed("org.gone", ExtraField::StarCount(5)).await;

        let catalog = TomlCatalog::from_toml_str(CATALOG).unwrap();
        aggregate(&catalog, &store, &config()).await.unwrap();

        let summary = store.aggregated().await.unwrap();
        assert!(!summary.contains_key("org.gone"));
        assert_eq!(summary.len(), 2);
    }

    #[tokio::test]
    async fn single_bulk_write() {
        let catalog = TomlCatalog::from_toml_str(CATALOG).unwrap();
        let store = MemoryStore::new();

        let report = aggregate(&catalog, &store, &config()).await.unwrap();

        assert_eq!(report.records, 2);
        assert_eq!(store.aggregate_writes().await, 1);
        assert_eq!(store.field_writes().await, 0);
    }

    #[tokio::test]
    async fn read_failure_keeps_previous_summary() {
        let catalog = TomlCatalog::from_toml_str(CATALOG).unwrap();
        let store = MemoryStore::new();
        aggregate(&catalog, &store, &config()).await.unwrap();
        let before = store.aggregated().await;

        store.fail_reads().await;
        assert!(aggregate(&catalog, &store, &config()).await.is_err());

        assert_eq!(store.aggregate_writes().await, 1);
        assert_eq!(store.aggregated().await, before);
    }

    #[tokio::test]
    async fn empty_catalog_writes_empty_summary() {
        let catalog = TomlCatalog::from_toml_str("").unwrap();
        let store = MemoryStore::new();

        let report = aggregate(&catalog, &store, &config()).await.unwrap();

        assert_eq!(report.records, 0);
        assert_eq!(store.aggregated().await, Some(AggregatedSummary::new()));
    }
}

//! End-to-end `run` pipeline: select packages → enrich → aggregate.

use tracing::{info, instrument};

use enricher_shared::{AggregateConfig, PackageId, Result};

use crate::aggregator::{self, AggregateReport};
use crate::catalog::Catalog;
use crate::fetchers::FieldFetchers;
use crate::orchestrator::{self, EnrichReport};
use crate::progress::ProgressReporter;
use crate::store::FieldStore;

/// Which packages a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every package in the catalog.
    All,
    /// These packages, in this order.
    Packages(Vec<PackageId>),
}

impl Selection {
    async fn resolve(&self, catalog: &dyn Catalog) -> Result<Vec<PackageId>> {
        match self {
            Self::All => catalog.list_all().await,
            Self::Packages(ids) => Ok(ids.clone()),
        }
    }
}

/// Result of the `run` pipeline.
#[derive(Debug)]
pub struct RunResult {
    pub enrich: EnrichReport,
    /// `None` when aggregation was disabled.
    pub aggregate: Option<AggregateReport>,
}

/// Enrich the selected packages, then rebuild the aggregated summary.
///
/// Aggregation starts only after every selected package has been attempted.
#[instrument(skip_all, fields(aggregate = with_aggregate))]
pub async fn run(
    selection: &Selection,
    with_aggregate: bool,
    catalog: &dyn Catalog,
    store: &dyn FieldStore,
    fetchers: &FieldFetchers,
    aggregate_config: &AggregateConfig,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let ids = selection.resolve(catalog).await?;
    info!(packages = ids.len(), "starting enrichment");

    let enrich = orchestrator::enrich_packages(&ids, catalog, store, fetchers, progress).await;

    let aggregate = if with_aggregate {
        progress.phase("Aggregating");
        Some(aggregator::aggregate(catalog, store, aggregate_config).await?)
    } else {
        None
    };

    progress.finish(&format!(
        "{} packages enriched, {} skipped",
        enrich.attempted, enrich.skipped
    ));

    Ok(RunResult { enrich, aggregate })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TomlCatalog;
    use crate::progress::SilentProgress;
    use crate::store::testing::MemoryStore;
    use enricher_shared::{AggregatedRecord, ExtraField, FieldKind, HostingConfig};
    use enricher_sources::SourceConfig;
    use enricher_storage::Storage;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CATALOG: &str = r#"
[[packages]]
id = "com.foo.bar"
repository = "foo/bar"

[[packages]]
id = "org.other"
repository = "other/plugin"
"#;

    fn fetchers(server: &MockServer) -> FieldFetchers {
        FieldFetchers::new(
            &SourceConfig::for_base_url(&server.uri()),
            &HostingConfig::default().avatar_pattern,
        )
        .unwrap()
    }

    /// `com.foo.bar` has 42 stars and nothing else; everything else is 404.
    async fn foo_bar_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/foo/bar"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"stargazers_count":42}"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn star_count_flows_into_summary() {
        let server = foo_bar_server().await;
        let catalog = TomlCatalog::from_toml_str(CATALOG).unwrap();
        let store = MemoryStore::new();

        let result = run(
            &Selection::Packages(vec!["com.foo.bar".into()]),
            true,
            &catalog,
            &store,
            &fetchers(&server),
            &AggregateConfig::default(),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(result.aggregate.unwrap().records, 2);
        assert_eq!(
            store.field(FieldKind::StarCount, "com.foo.bar").await,
            Some(ExtraField::StarCount(42))
        );

        let summary = store.aggregated().await.unwrap();
        assert_eq!(
            summary["com.foo.bar"],
            AggregatedRecord {
                stars: 42,
                runtime_version: "1.0.0".into(),
                // repository page 404s, so nothing was stored
                cover_image_url: None,
                updated_time: None,
            }
        );
        assert_eq!(summary["org.other"].stars, 0);
    }

    #[tokio::test]
    async fn enriching_twice_is_idempotent() {
        let server = foo_bar_server().await;
        let catalog = TomlCatalog::from_toml_str(CATALOG).unwrap();
        let fetchers = fetchers(&server);

        let once = MemoryStore::new();
        run(
            &Selection::All,
            true,
            &catalog,
            &once,
            &fetchers,
            &AggregateConfig::default(),
            &SilentProgress,
        )
        .await
        .unwrap();

        let twice = MemoryStore::new();
        for with_aggregate in [false, true] {
            run(
                &Selection::All,
                with_aggregate,
                &catalog,
                &twice,
                &fetchers,
                &AggregateConfig::default(),
                &SilentProgress,
            )
            .await
            .unwrap();
        }

        assert_eq!(once.snapshot().await, twice.snapshot().await);
        assert_eq!(once.aggregated().await, twice.aggregated().await);
    }

    #[tokio::test]
    async fn no_aggregate_leaves_summary_alone() {
        let server = foo_bar_server().await;
        let catalog = TomlCatalog::from_toml_str(CATALOG).unwrap();
        let store = MemoryStore::new();

        let result = run(
            &Selection::All,
            false,
            &catalog,
            &store,
            &fetchers(&server),
            &AggregateConfig::default(),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert!(result.aggregate.is_none());
        assert_eq!(result.enrich.attempted, 2);
        assert_eq!(store.aggregate_writes().await, 0);
    }

    #[tokio::test]
    async fn runs_against_libsql_storage() {
        let server = foo_bar_server().await;
        let catalog = TomlCatalog::from_toml_str(CATALOG).unwrap();
        let tmp = std::env::temp_dir().join(format!("enricher_pipeline_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.unwrap();

        let result = run(
            &Selection::All,
            true,
            &catalog,
            &storage,
            &fetchers(&server),
            &AggregateConfig::default(),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(result.enrich.attempted, 2);
        let summary = storage.get_aggregated().await.unwrap().unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary["com.foo.bar"].stars, 42);
    }
}

//! Sequential enrichment of a list of packages.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use enricher_shared::{FieldKind, PackageId};

use crate::catalog::Catalog;
use crate::fetchers::{FieldFetchers, FieldOutcome};
use crate::progress::ProgressReporter;
use crate::store::FieldStore;

/// Tally of one enrichment run. Also stored as the run record's stats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    /// Packages whose fields were fetched.
    pub attempted: usize,
    /// Packages skipped because they are unknown or have no usable descriptor.
    pub skipped: usize,
    pub written: usize,
    pub not_found: usize,
    pub unavailable: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

impl EnrichReport {
    fn count(&mut self, outcome: &FieldOutcome) {
        match outcome {
            FieldOutcome::Written => self.written += 1,
            FieldOutcome::NotFound => self.not_found += 1,
            FieldOutcome::Unavailable => self.unavailable += 1,
            FieldOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Enrich `ids` in order, one package and one field at a time.
///
/// Unknown packages and unloadable descriptors are logged and skipped. A run
/// record is kept only when at least one package was enriched.
/// Individual field failures are contained by the fetchers; this function
/// always returns once every id has been attempted.
#[instrument(skip_all, fields(requested = ids.len()))]
pub async fn enrich_packages(
    ids: &[PackageId],
    catalog: &dyn Catalog,
    store: &dyn FieldStore,
    fetchers: &FieldFetchers,
    progress: &dyn ProgressReporter,
) -> EnrichReport {
    let start = Instant::now();
    let mut report = EnrichReport::default();

    // Opened on the first enrichable package; a batch of unknown ids leaves
    // no trace in the store.
    let mut run_id: Option<String> = None;

    progress.phase("Enriching");
    let total = ids.len();

    for (i, package_id) in ids.iter().enumerate() {
        progress.package_started(package_id, i + 1, total);

        match catalog.exists(package_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(package_id = %package_id, "package not in catalog, skipping");
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                warn!(package_id = %package_id, error = %e, "existence check failed, skipping");
                report.skipped += 1;
                continue;
            }
        }

        let descriptor = match catalog.load_descriptor(package_id).await {
            Ok(d) => d,
            Err(e) => {
                warn!(package_id = %package_id, error = %e, "failed to load descriptor, skipping");
                report.skipped += 1;
                continue;
            }
        };

        if report.attempted == 0 {
            run_id = match store.begin_run().await {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, "failed to record run start");
                    None
                }
            };
        }
        report.attempted += 1;
        for kind in FieldKind::ALL {
            let outcome = fetchers.fetch(kind, store, package_id, &descriptor).await;
            report.count(&outcome);
        }
        debug!(package_id = %package_id, "package enriched");
    }

    report.elapsed_ms = start.elapsed().as_millis() as u64;

    if let Some(run_id) = run_id {
        match serde_json::to_string(&report) {
            Ok(stats) => {
                if let Err(e) = store.finish_run(&run_id, &stats).await {
                    warn!(run_id = %run_id, error = %e, "failed to record run end");
                }
            }
            Err(e) => warn!(run_id = %run_id, error = %e, "failed to serialize run stats"),
        }
    }

    info!(
        attempted = report.attempted,
        skipped = report.skipped,
        written = report.written,
        not_found = report.not_found,
        unavailable = report.unavailable,
        failed = report.failed,
        elapsed_ms = report.elapsed_ms,
        "enrichment complete"
    );

    report
}

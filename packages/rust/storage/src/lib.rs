//! Turso Embedded / libSQL storage layer (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding the per-package
//! extra fields, the aggregated cross-package summary, and enrichment run
//! history.
//!
//! **Access rules:**
//! - Enricher CLI: read-write (sole writer) via [`Storage::open`]
//! - Downstream consumers: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::Utc;
use enricher_shared::{AggregatedSummary, EnricherError, ExtraField, FieldKind, Result};
use libsql::{Connection, Database, params};
use uuid::Uuid;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EnricherError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| EnricherError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| EnricherError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| EnricherError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| EnricherError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        EnricherError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(EnricherError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Extra field operations
    // -----------------------------------------------------------------------

    /// Read one stored field. `None` if the fetcher never wrote it.
    pub async fn get_field(&self, kind: FieldKind, package_id: &str) -> Result<Option<ExtraField>> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM extra_fields WHERE kind = ?1 AND package_id = ?2",
                params![kind.as_str(), package_id],
            )
            .await
            .map_err(|e| EnricherError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row
                    .get(0)
                    .map_err(|e| EnricherError::Storage(e.to_string()))?;
                Ok(Some(ExtraField::decode(kind, &raw)?))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(EnricherError::Storage(e.to_string())),
        }
    }

    /// Write (or overwrite) one field for a package.
    pub async fn set_field(&self, package_id: &str, field: &ExtraField) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let value = field.encode();
        self.conn
            .execute(
                "INSERT INTO extra_fields (kind, package_id, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(kind, package_id) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at",
                params![field.kind().as_str(), package_id, value.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| EnricherError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Aggregated summary operations
    // -----------------------------------------------------------------------

    /// Replace the whole aggregated summary in a single statement.
    pub async fn set_aggregated(&self, summary: &AggregatedSummary) -> Result<()> {
        self.check_writable()?;
        let json = serde_json::to_string(summary)
            .map_err(|e| EnricherError::Storage(format!("failed to encode summary: {e}")))?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO aggregated_summary (id, summary_json, updated_at)
                 VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET
                   summary_json = excluded.summary_json,
                   updated_at = excluded.updated_at",
                params![json.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| EnricherError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Read the current aggregated summary, if one was ever written.
    pub async fn get_aggregated(&self) -> Result<Option<AggregatedSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT summary_json FROM aggregated_summary WHERE id = 1",
                params![],
            )
            .await
            .map_err(|e| EnricherError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let json: String = row
                    .get(0)
                    .map_err(|e| EnricherError::Storage(e.to_string()))?;
                let summary = serde_json::from_str(&json)
                    .map_err(|e| EnricherError::Storage(format!("corrupt summary: {e}")))?;
                Ok(Some(summary))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(EnricherError::Storage(e.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Run history
    // -----------------------------------------------------------------------

    /// Record the start of an enrichment run. Returns the generated run ID.
    pub async fn insert_run(&self) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO enrichment_runs (id, started_at) VALUES (?1, ?2)",
                params![id.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| EnricherError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Mark a run finished with its statistics.
    pub async fn finish_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE enrichment_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(|e| EnricherError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Stats of a finished run, `None` while still running or unknown.
    pub async fn get_run_stats(&self, run_id: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT stats_json FROM enrichment_runs WHERE id = ?1",
                params![run_id],
            )
            .await
            .map_err(|e| EnricherError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<String>(0).ok()),
            Ok(None) => Ok(None),
            Err(e) => Err(EnricherError::Storage(e.to_string())),
        }
    }
}

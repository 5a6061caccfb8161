//! SQL migration definitions for the enricher database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as one batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: extra_fields, aggregated_summary, enrichment_runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per (field kind, package); overwritten in place by its fetcher
CREATE TABLE IF NOT EXISTS extra_fields (
    kind       TEXT NOT NULL,
    package_id TEXT NOT NULL,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (kind, package_id)
);

CREATE INDEX IF NOT EXISTS idx_extra_fields_package ON extra_fields(package_id);

-- Cross-package summary, replaced wholesale by the aggregator
CREATE TABLE IF NOT EXISTS aggregated_summary (
    id           INTEGER PRIMARY KEY CHECK (id = 1),
    summary_json TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

-- Enrichment run history
CREATE TABLE IF NOT EXISTS enrichment_runs (
    id          TEXT PRIMARY KEY,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}

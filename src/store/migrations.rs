//! Schema migrations for the libSQL backend, tracked in `schema_versions`.

use libsql::Connection;
use tracing::{debug, info};

use crate::error::DatabaseError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Append only. Versions must increase.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "ideas_and_decisions",
        sql: r#"
            CREATE TABLE IF NOT EXISTS ideas (
                id TEXT PRIMARY KEY,
                workspace_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'active',
                priority TEXT NOT NULL DEFAULT 'medium',
                category TEXT NOT NULL DEFAULT 'general',
                votes INTEGER NOT NULL DEFAULT 0,
                vote_records TEXT NOT NULL DEFAULT '[]',
                idea_trigger TEXT NOT NULL DEFAULT '{"type":"none"}',
                is_dormant INTEGER NOT NULL DEFAULT 0,
                dormancy_reason TEXT,
                archive_reason TEXT,
                lineage TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ideas_workspace ON ideas(workspace_id);
            CREATE INDEX IF NOT EXISTS idx_ideas_status ON ideas(workspace_id, status);

            CREATE TABLE IF NOT EXISTS decisions (
                id TEXT PRIMARY KEY,
                workspace_id TEXT NOT NULL,
                idea_id TEXT NOT NULL,
                decision_type TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                outcome TEXT NOT NULL,
                decided_by TEXT NOT NULL,
                decided_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_decisions_workspace ON decisions(workspace_id);
            CREATE INDEX IF NOT EXISTS idx_decisions_idea ON decisions(idea_id);
        "#,
    },
    Migration {
        version: 2,
        name: "metrics_and_activity",
        sql: r#"
            CREATE TABLE IF NOT EXISTS metrics (
                workspace_id TEXT NOT NULL,
                name TEXT NOT NULL,
                current_value REAL NOT NULL,
                target_value REAL NOT NULL,
                unit TEXT NOT NULL DEFAULT '',
                trend TEXT NOT NULL DEFAULT 'flat',
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (workspace_id, name)
            );

            CREATE TABLE IF NOT EXISTS activity_logs (
                id TEXT PRIMARY KEY,
                workspace_id TEXT NOT NULL,
                idea_id TEXT,
                action TEXT NOT NULL,
                details TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_activity_workspace
                ON activity_logs(workspace_id, created_at);
        "#,
    },
];

fn migration_err(context: &str, e: libsql::Error) -> DatabaseError {
    DatabaseError::Migration(format!("{context}: {e}"))
}

/// Bring the schema up to the latest version. Safe to call on every start.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_versions (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| migration_err("Failed to create schema_versions", e))?;

    let applied = applied_version(conn).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > applied).collect();
    if pending.is_empty() {
        debug!(version = applied, "Schema up to date");
        return Ok(());
    }

    for migration in pending {
        info!(version = migration.version, name = migration.name, "Applying migration");
        conn.execute_batch(migration.sql)
            .await
            .map_err(|e| migration_err(&format!("V{} {}", migration.version, migration.name), e))?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_versions (version, name) VALUES (?1, ?2)",
            libsql::params![migration.version, migration.name],
        )
        .await
        .map_err(|e| migration_err("Failed to record version", e))?;
    }
    Ok(())
}

/// Highest applied version, 0 on a fresh database.
async fn applied_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_versions", ())
        .await
        .map_err(|e| migration_err("Failed to query schema version", e))?;
    match rows
        .next()
        .await
        .map_err(|e| migration_err("Failed to read schema version", e))?
    {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| migration_err("Bad schema version", e)),
        None => Ok(0),
    }
}

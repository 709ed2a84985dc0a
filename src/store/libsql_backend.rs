//! libSQL implementation of the async `Store` trait.
//!
//! Supports local file and in-memory databases. Nested collections
//! (votes, lineage, trigger) are stored as JSON text columns.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::ideas::merge::MergePlan;
use crate::ideas::model::{ActivityLog, Decision, Idea, IdeaStatus, Metric};
use crate::store::migrations;
use crate::store::traits::Store;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(column: &str, raw: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(raw)
        .map_err(|e| DatabaseError::Serialization(format!("{column}: {e}")))
}

fn parse_uuid(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::Serialization(format!("bad uuid '{raw}': {e}")))
}

fn row_err(context: &str) -> impl Fn(libsql::Error) -> DatabaseError + '_ {
    move |e| DatabaseError::Query(format!("{context}: {e}"))
}

const IDEA_COLUMNS: &str = "id, workspace_id, title, description, status, priority, category, votes, vote_records, idea_trigger, is_dormant, dormancy_reason, archive_reason, lineage, created_at, updated_at";

const DECISION_COLUMNS: &str =
    "id, workspace_id, idea_id, decision_type, title, content, outcome, decided_by, decided_at";

const METRIC_COLUMNS: &str = "workspace_id, name, current_value, target_value, unit, trend";

const ACTIVITY_COLUMNS: &str = "id, workspace_id, idea_id, action, details, created_at";

/// Map a libsql Row to an Idea. Column order matches IDEA_COLUMNS.
fn row_to_idea(row: &libsql::Row) -> Result<Idea, DatabaseError> {
    let get = row_err("idea row");
    let id: String = row.get(0).map_err(&get)?;
    let status: String = row.get(4).map_err(&get)?;
    let priority: String = row.get(5).map_err(&get)?;
    let votes: i64 = row.get(7).map_err(&get)?;
    let vote_records: String = row.get(8).map_err(&get)?;
    let trigger: String = row.get(9).map_err(&get)?;
    let is_dormant: i64 = row.get(10).map_err(&get)?;
    let lineage: String = row.get(13).map_err(&get)?;
    let created: String = row.get(14).map_err(&get)?;
    let updated: String = row.get(15).map_err(&get)?;

    Ok(Idea {
        id: parse_uuid(&id)?,
        workspace_id: row.get(1).map_err(&get)?,
        title: row.get(2).map_err(&get)?,
        description: row.get(3).map_err(&get)?,
        status: status.parse().map_err(DatabaseError::Serialization)?,
        priority: priority.parse().map_err(DatabaseError::Serialization)?,
        category: row.get(6).map_err(&get)?,
        votes: votes.max(0) as u32,
        vote_records: from_json("vote_records", &vote_records)?,
        trigger: from_json("idea_trigger", &trigger)?,
        is_dormant: is_dormant != 0,
        dormancy_reason: row.get(11).ok(),
        archive_reason: row.get(12).ok(),
        lineage: from_json("lineage", &lineage)?,
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

fn row_to_decision(row: &libsql::Row) -> Result<Decision, DatabaseError> {
    let get = row_err("decision row");
    let id: String = row.get(0).map_err(&get)?;
    let idea_id: String = row.get(2).map_err(&get)?;
    let decision_type: String = row.get(3).map_err(&get)?;
    let outcome: String = row.get(6).map_err(&get)?;
    let decided_at: String = row.get(8).map_err(&get)?;

    Ok(Decision::from_parts(
        parse_uuid(&id)?,
        row.get(1).map_err(&get)?,
        parse_uuid(&idea_id)?,
        decision_type.parse().map_err(DatabaseError::Serialization)?,
        row.get(4).map_err(&get)?,
        row.get(5).map_err(&get)?,
        outcome.parse().map_err(DatabaseError::Serialization)?,
        row.get(7).map_err(&get)?,
        parse_datetime(&decided_at),
    ))
}

fn row_to_metric(row: &libsql::Row) -> Result<Metric, DatabaseError> {
    let get = row_err("metric row");
    let trend: String = row.get(5).map_err(&get)?;
    Ok(Metric {
        workspace_id: row.get(0).map_err(&get)?,
        name: row.get(1).map_err(&get)?,
        current_value: row.get(2).map_err(&get)?,
        target_value: row.get(3).map_err(&get)?,
        unit: row.get(4).map_err(&get)?,
        trend: trend.parse().unwrap_or_default(),
    })
}

fn row_to_activity(row: &libsql::Row) -> Result<ActivityLog, DatabaseError> {
    let get = row_err("activity row");
    let id: String = row.get(0).map_err(&get)?;
    let idea_id: Option<String> = row.get(2).ok();
    let created: String = row.get(5).map_err(&get)?;
    Ok(ActivityLog {
        id: parse_uuid(&id)?,
        workspace_id: row.get(1).map_err(&get)?,
        idea_id: idea_id.as_deref().map(parse_uuid).transpose()?,
        action: row.get(3).map_err(&get)?,
        details: row.get(4).map_err(&get)?,
        created_at: parse_datetime(&created),
    })
}

// ── Statement helpers shared by plain calls and merge transactions ──

async fn write_update_idea(conn: &Connection, idea: &Idea) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE ideas SET title = ?1, description = ?2, status = ?3, priority = ?4, category = ?5, votes = ?6, vote_records = ?7, idea_trigger = ?8, is_dormant = ?9, dormancy_reason = ?10, archive_reason = ?11, lineage = ?12, updated_at = ?13 WHERE id = ?14",
            params![
                idea.title.as_str(),
                idea.description.as_str(),
                idea.status.as_str(),
                idea.priority.as_str(),
                idea.category.as_str(),
                idea.votes as i64,
                to_json(&idea.vote_records)?,
                to_json(&idea.trigger)?,
                idea.is_dormant as i64,
                idea.dormancy_reason.clone(),
                idea.archive_reason.clone(),
                to_json(&idea.lineage)?,
                idea.updated_at.to_rfc3339(),
                idea.id.to_string(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("update_idea: {e}")))?;

    if changed == 0 {
        return Err(DatabaseError::idea_not_found(idea.id));
    }
    Ok(())
}

async fn write_decision(conn: &Connection, decision: &Decision) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO decisions ({DECISION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        params![
            decision.id().to_string(),
            decision.workspace_id(),
            decision.idea_id().to_string(),
            decision.decision_type().as_str(),
            decision.title(),
            decision.content(),
            decision.outcome().as_str(),
            decision.decided_by(),
            decision.decided_at().to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("insert_decision: {e}")))?;
    Ok(())
}

async fn write_activity(conn: &Connection, entry: &ActivityLog) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO activity_logs ({ACTIVITY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            entry.id.to_string(),
            entry.workspace_id.as_str(),
            entry.idea_id.map(|id| id.to_string()),
            entry.action.as_str(),
            entry.details.as_str(),
            entry.created_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("log_activity: {e}")))?;
    Ok(())
}

async fn write_merge(conn: &Connection, plan: &MergePlan) -> Result<(), DatabaseError> {
    write_update_idea(conn, &plan.target).await?;
    for source in &plan.sources {
        write_update_idea(conn, source).await?;
    }
    for decision in &plan.decisions {
        write_decision(conn, decision).await?;
    }
    write_activity(conn, &plan.activity).await
}

async fn collect_ideas(mut rows: libsql::Rows, context: &str) -> Result<Vec<Idea>, DatabaseError> {
    let mut ideas = Vec::new();
    while let Some(row) = rows.next().await.map_err(row_err(context))? {
        ideas.push(row_to_idea(&row)?);
    }
    Ok(ideas)
}

async fn collect_decisions(
    mut rows: libsql::Rows,
    context: &str,
) -> Result<Vec<Decision>, DatabaseError> {
    let mut decisions = Vec::new();
    while let Some(row) = rows.next().await.map_err(row_err(context))? {
        decisions.push(row_to_decision(&row)?);
    }
    Ok(decisions)
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Store for LibSqlStore {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Ideas ───────────────────────────────────────────────────────

    async fn create_idea(&self, idea: &Idea) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!("INSERT INTO ideas ({IDEA_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"),
                params![
                    idea.id.to_string(),
                    idea.workspace_id.as_str(),
                    idea.title.as_str(),
                    idea.description.as_str(),
                    idea.status.as_str(),
                    idea.priority.as_str(),
                    idea.category.as_str(),
                    idea.votes as i64,
                    to_json(&idea.vote_records)?,
                    to_json(&idea.trigger)?,
                    idea.is_dormant as i64,
                    idea.dormancy_reason.clone(),
                    idea.archive_reason.clone(),
                    to_json(&idea.lineage)?,
                    idea.created_at.to_rfc3339(),
                    idea.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_idea: {e}")))?;
        debug!(id = %idea.id, "Idea created");
        Ok(())
    }

    async fn get_idea(&self, id: Uuid) -> Result<Option<Idea>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {IDEA_COLUMNS} FROM ideas WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_idea: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_idea(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_idea row: {e}"))),
        }
    }

    async fn update_idea(&self, idea: &Idea) -> Result<(), DatabaseError> {
        write_update_idea(self.conn(), idea).await
    }

    async fn list_ideas(&self, workspace_id: &str) -> Result<Vec<Idea>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!("SELECT {IDEA_COLUMNS} FROM ideas WHERE workspace_id = ?1 ORDER BY created_at ASC, id ASC"),
                params![workspace_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_ideas: {e}")))?;
        collect_ideas(rows, "list_ideas").await
    }

    async fn list_ideas_by_status(
        &self,
        workspace_id: &str,
        status: IdeaStatus,
    ) -> Result<Vec<Idea>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!("SELECT {IDEA_COLUMNS} FROM ideas WHERE workspace_id = ?1 AND status = ?2 ORDER BY created_at ASC, id ASC"),
                params![workspace_id, status.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_ideas_by_status: {e}")))?;
        collect_ideas(rows, "list_ideas_by_status").await
    }

    // ── Decisions ───────────────────────────────────────────────────

    async fn insert_decision(&self, decision: &Decision) -> Result<(), DatabaseError> {
        write_decision(self.conn(), decision).await
    }

    async fn list_decisions(&self, workspace_id: &str) -> Result<Vec<Decision>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!("SELECT {DECISION_COLUMNS} FROM decisions WHERE workspace_id = ?1 ORDER BY decided_at DESC"),
                params![workspace_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_decisions: {e}")))?;
        collect_decisions(rows, "list_decisions").await
    }

    async fn list_decisions_for_idea(
        &self,
        idea_id: Uuid,
    ) -> Result<Vec<Decision>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!("SELECT {DECISION_COLUMNS} FROM decisions WHERE idea_id = ?1 ORDER BY decided_at DESC"),
                params![idea_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_decisions_for_idea: {e}")))?;
        collect_decisions(rows, "list_decisions_for_idea").await
    }

    // ── Metrics ─────────────────────────────────────────────────────

    async fn upsert_metric(&self, metric: &Metric) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO metrics (workspace_id, name, current_value, target_value, unit, trend, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(workspace_id, name) DO UPDATE SET
                   current_value = excluded.current_value,
                   target_value = excluded.target_value,
                   unit = excluded.unit,
                   trend = excluded.trend,
                   updated_at = excluded.updated_at",
                params![
                    metric.workspace_id.as_str(),
                    metric.name.as_str(),
                    metric.current_value,
                    metric.target_value,
                    metric.unit.as_str(),
                    metric.trend.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_metric: {e}")))?;
        Ok(())
    }

    async fn list_metrics(&self, workspace_id: &str) -> Result<Vec<Metric>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {METRIC_COLUMNS} FROM metrics WHERE workspace_id = ?1 ORDER BY name ASC"),
                params![workspace_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_metrics: {e}")))?;

        let mut metrics = Vec::new();
        while let Some(row) = rows.next().await.map_err(row_err("list_metrics"))? {
            metrics.push(row_to_metric(&row)?);
        }
        Ok(metrics)
    }

    // ── Activity ────────────────────────────────────────────────────

    async fn log_activity(&self, entry: &ActivityLog) -> Result<(), DatabaseError> {
        write_activity(self.conn(), entry).await
    }

    async fn list_activity(
        &self,
        workspace_id: &str,
        limit: usize,
    ) -> Result<Vec<ActivityLog>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ACTIVITY_COLUMNS} FROM activity_logs WHERE workspace_id = ?1 ORDER BY created_at DESC LIMIT ?2"),
                params![workspace_id, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_activity: {e}")))?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await.map_err(row_err("list_activity"))? {
            entries.push(row_to_activity(&row)?);
        }
        Ok(entries)
    }

    // ── Merge ───────────────────────────────────────────────────────

    async fn apply_merge(&self, plan: &MergePlan) -> Result<(), DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("begin: {e}")))?;

        match write_merge(&tx, plan).await {
            Ok(()) => {
                tx.commit()
                    .await
                    .map_err(|e| DatabaseError::Transaction(format!("commit: {e}")))?;
                debug!(
                    target_id = %plan.target.id,
                    sources = plan.sources.len(),
                    "Merge committed"
                );
                Ok(())
            }
            Err(e) => {
                warn!(target_id = %plan.target.id, error = %e, "Merge failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(DatabaseError::Transaction(e.to_string()))
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ideas::model::{
        DecisionOutcome, DecisionType, LineageEntry, LineageKind, Priority, Trigger, Vote,
    };

    async fn test_db() -> LibSqlStore {
        LibSqlStore::new_memory().await.unwrap()
    }

    fn make_idea(title: &str) -> Idea {
        Idea::new("ws1", title)
            .with_description("some description")
            .with_priority(Priority::High)
    }

    #[tokio::test]
    async fn create_and_get_idea() {
        let db = test_db().await;
        let mut idea = make_idea("Offline mode").with_trigger(Trigger::Metric {
            condition: "MAU > 5000".into(),
        });
        idea.vote_records.push(Vote {
            user: "alice".into(),
            tag: "must-have".into(),
            timestamp: Utc::now(),
        });
        idea.votes = 1;
        db.create_idea(&idea).await.unwrap();

        let fetched = db.get_idea(idea.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Offline mode");
        assert_eq!(fetched.priority, Priority::High);
        assert_eq!(fetched.votes, 1);
        assert_eq!(fetched.vote_records.len(), 1);
        assert_eq!(fetched.trigger_metric(), Some("MAU > 5000"));
        assert!(fetched.dormancy_reason.is_none());
    }

    #[tokio::test]
    async fn get_idea_not_found() {
        let db = test_db().await;
        assert!(db.get_idea(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_idea_persists_lineage_and_status() {
        let db = test_db().await;
        let mut idea = make_idea("Widgets");
        db.create_idea(&idea).await.unwrap();

        idea.status = IdeaStatus::Frozen;
        idea.is_dormant = true;
        idea.dormancy_reason = Some("waiting on Q3".into());
        idea.lineage.push(LineageEntry {
            kind: LineageKind::Child,
            idea_id: Uuid::new_v4(),
            idea_title: "Gadgets".into(),
            timestamp: Utc::now(),
        });
        db.update_idea(&idea).await.unwrap();

        let fetched = db.get_idea(idea.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, IdeaStatus::Frozen);
        assert!(fetched.is_dormant);
        assert_eq!(fetched.dormancy_reason.as_deref(), Some("waiting on Q3"));
        assert_eq!(fetched.lineage.len(), 1);
    }

    #[tokio::test]
    async fn update_missing_idea_is_not_found() {
        let db = test_db().await;
        let err = db.update_idea(&make_idea("ghost")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_ideas_scoped_by_workspace_and_status() {
        let db = test_db().await;
        db.create_idea(&make_idea("a")).await.unwrap();
        db.create_idea(&make_idea("b").frozen("later")).await.unwrap();
        db.create_idea(&Idea::new("ws2", "other tenant")).await.unwrap();

        assert_eq!(db.list_ideas("ws1").await.unwrap().len(), 2);
        let frozen = db
            .list_ideas_by_status("ws1", IdeaStatus::Frozen)
            .await
            .unwrap();
        assert_eq!(frozen.len(), 1);
        assert_eq!(frozen[0].title, "b");
        assert_eq!(db.list_ideas("ws2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn decisions_roundtrip() {
        let db = test_db().await;
        let idea = make_idea("x");
        db.create_idea(&idea).await.unwrap();
        let decision = Decision::new(
            "ws1",
            idea.id,
            DecisionType::Freeze,
            "Froze x",
            "not now",
            DecisionOutcome::Deferred,
            "alice",
            Utc::now(),
        );
        db.insert_decision(&decision).await.unwrap();

        let for_idea = db.list_decisions_for_idea(idea.id).await.unwrap();
        assert_eq!(for_idea, vec![decision.clone()]);
        assert_eq!(db.list_decisions("ws1").await.unwrap().len(), 1);
        assert!(db.list_decisions("ws2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_metric_replaces_values() {
        let db = test_db().await;
        db.upsert_metric(&Metric::new("ws1", "MAU", 100.0, 5000.0))
            .await
            .unwrap();
        db.upsert_metric(&Metric::new("ws1", "MAU", 4200.0, 5000.0))
            .await
            .unwrap();

        let metrics = db.list_metrics("ws1").await.unwrap();
        assert_eq!(metrics.len(), 1);
        assert!((metrics[0].current_value - 4200.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn activity_most_recent_first() {
        let db = test_db().await;
        let earlier = Utc::now() - chrono::Duration::minutes(5);
        db.log_activity(&ActivityLog::new("ws1", None, "created", "first", earlier))
            .await
            .unwrap();
        db.log_activity(&ActivityLog::new("ws1", None, "frozen", "second", Utc::now()))
            .await
            .unwrap();

        let entries = db.list_activity("ws1", 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].details, "second");
        assert_eq!(db.list_activity("ws1", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn apply_merge_rolls_back_on_missing_source() {
        let db = test_db().await;
        let target = make_idea("target").with_votes(2);
        db.create_idea(&target).await.unwrap();

        // Source never inserted: the UPDATE inside the transaction fails.
        let ghost = make_idea("ghost").with_votes(3);
        let plan = crate::ideas::merge::plan_merge(&target, &[ghost], Utc::now(), "alice");

        let err = db.apply_merge(&plan).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Transaction(_)));

        let fetched = db.get_idea(target.id).await.unwrap().unwrap();
        assert_eq!(fetched.votes, 2);
        assert!(fetched.lineage.is_empty());
        assert!(db.list_decisions("ws1").await.unwrap().is_empty());
        assert!(db.list_activity("ws1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopen_file_database() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("icebox.db");
        let idea = make_idea("persisted");
        {
            let db = LibSqlStore::new_local(&path).await.unwrap();
            db.create_idea(&idea).await.unwrap();
        }
        let db = LibSqlStore::new_local(&path).await.unwrap();
        assert!(db.get_idea(idea.id).await.unwrap().is_some());
    }
}

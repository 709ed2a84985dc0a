//! Unified async `Store` trait for all persistence.
//!
//! Every query is scoped by workspace. Two backends share this contract:
//! [`LibSqlStore`](super::LibSqlStore) for persistent storage and
//! [`MemoryStore`](super::MemoryStore) for demo mode.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::ideas::merge::MergePlan;
use crate::ideas::model::{ActivityLog, Decision, Idea, IdeaStatus, Metric};

/// Backend-agnostic store covering ideas, decisions, metrics and activity.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create tables / run pending migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Ideas ───────────────────────────────────────────────────────

    async fn create_idea(&self, idea: &Idea) -> Result<(), DatabaseError>;

    async fn get_idea(&self, id: Uuid) -> Result<Option<Idea>, DatabaseError>;

    /// Overwrite every mutable column of an existing idea. Last write wins.
    async fn update_idea(&self, idea: &Idea) -> Result<(), DatabaseError>;

    /// All ideas in a workspace, oldest first.
    async fn list_ideas(&self, workspace_id: &str) -> Result<Vec<Idea>, DatabaseError>;

    async fn list_ideas_by_status(
        &self,
        workspace_id: &str,
        status: IdeaStatus,
    ) -> Result<Vec<Idea>, DatabaseError>;

    // ── Decisions (insert + read only) ──────────────────────────────

    async fn insert_decision(&self, decision: &Decision) -> Result<(), DatabaseError>;

    /// Decisions in a workspace, most recent first.
    async fn list_decisions(&self, workspace_id: &str) -> Result<Vec<Decision>, DatabaseError>;

    async fn list_decisions_for_idea(&self, idea_id: Uuid)
    -> Result<Vec<Decision>, DatabaseError>;

    // ── Metrics ─────────────────────────────────────────────────────

    /// Insert or replace a metric keyed by (workspace, name).
    async fn upsert_metric(&self, metric: &Metric) -> Result<(), DatabaseError>;

    async fn list_metrics(&self, workspace_id: &str) -> Result<Vec<Metric>, DatabaseError>;

    // ── Activity ────────────────────────────────────────────────────

    async fn log_activity(&self, entry: &ActivityLog) -> Result<(), DatabaseError>;

    /// Most recent entries first, up to `limit`.
    async fn list_activity(
        &self,
        workspace_id: &str,
        limit: usize,
    ) -> Result<Vec<ActivityLog>, DatabaseError>;

    // ── Merge ───────────────────────────────────────────────────────

    /// Apply every write of a merge plan atomically: either the target,
    /// all sources, all decisions and the activity entry are persisted,
    /// or nothing is.
    async fn apply_merge(&self, plan: &MergePlan) -> Result<(), DatabaseError>;
}

//! Local store for demo mode (no database configured).
//!
//! Mirrors the libSQL backend's contract so callers never branch on which
//! one they hold. Tables live in memory; when opened on a file, every write
//! is flushed to a JSON snapshot so the next process sees it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::ideas::merge::MergePlan;
use crate::ideas::model::{ActivityLog, Decision, Idea, IdeaStatus, Metric};
use crate::store::traits::Store;

#[derive(Default)]
struct Tables {
    ideas: HashMap<Uuid, Idea>,
    decisions: Vec<Decision>,
    metrics: Vec<Metric>,
    activity: Vec<ActivityLog>,
}

/// On-disk shape of [`Tables`].
#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    ideas: Vec<Idea>,
    decisions: Vec<Decision>,
    metrics: Vec<Metric>,
    activity: Vec<ActivityLog>,
}

impl From<Snapshot> for Tables {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            ideas: snapshot.ideas.into_iter().map(|i| (i.id, i)).collect(),
            decisions: snapshot.decisions,
            metrics: snapshot.metrics,
            activity: snapshot.activity,
        }
    }
}

impl From<&Tables> for Snapshot {
    fn from(tables: &Tables) -> Self {
        let mut ideas: Vec<Idea> = tables.ideas.values().cloned().collect();
        ideas.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Self {
            ideas,
            decisions: tables.decisions.clone(),
            metrics: tables.metrics.clone(),
            activity: tables.activity.clone(),
        }
    }
}

/// Hash maps behind a single lock, optionally mirrored to a JSON file.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    /// Process-local only. Nothing survives the process.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path` if it exists and write every change back to it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref().to_path_buf();
        let tables = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Snapshot>(&bytes)
                .map_err(|e| DatabaseError::Serialization(format!("{}: {e}", path.display())))?
                .into(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Tables::default(),
            Err(e) => {
                return Err(DatabaseError::Pool(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        Ok(Self {
            tables: RwLock::new(tables),
            snapshot: Some(path),
        })
    }

    /// Flush the tables to the snapshot file, if any. Writes a sibling temp
    /// file and renames it so a crash never leaves a torn snapshot.
    async fn commit(&self, tables: &Tables) -> Result<(), DatabaseError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(&Snapshot::from(tables))
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                DatabaseError::Pool(format!("Failed to create {}: {e}", dir.display()))
            })?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| {
            DatabaseError::Query(format!("Failed to replace {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "Demo snapshot saved");
        Ok(())
    }
}

fn sorted_ideas<'a>(ideas: impl Iterator<Item = &'a Idea>) -> Vec<Idea> {
    let mut out: Vec<Idea> = ideas.cloned().collect();
    out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    out
}

fn newest_first(mut decisions: Vec<Decision>) -> Vec<Decision> {
    decisions.sort_by_key(|d| std::cmp::Reverse(d.decided_at()));
    decisions
}

#[async_trait]
impl Store for MemoryStore {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn create_idea(&self, idea: &Idea) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.ideas.contains_key(&idea.id) {
            return Err(DatabaseError::Query(format!(
                "create_idea: duplicate id {}",
                idea.id
            )));
        }
        tables.ideas.insert(idea.id, idea.clone());
        self.commit(&tables).await
    }

    async fn get_idea(&self, id: Uuid) -> Result<Option<Idea>, DatabaseError> {
        Ok(self.tables.read().await.ideas.get(&id).cloned())
    }

    async fn update_idea(&self, idea: &Idea) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        match tables.ideas.get_mut(&idea.id) {
            Some(existing) => *existing = idea.clone(),
            None => return Err(DatabaseError::idea_not_found(idea.id)),
        }
        self.commit(&tables).await
    }

    async fn list_ideas(&self, workspace_id: &str) -> Result<Vec<Idea>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(sorted_ideas(
            tables
                .ideas
                .values()
                .filter(|i| i.workspace_id == workspace_id),
        ))
    }

    async fn list_ideas_by_status(
        &self,
        workspace_id: &str,
        status: IdeaStatus,
    ) -> Result<Vec<Idea>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(sorted_ideas(tables.ideas.values().filter(|i| {
            i.workspace_id == workspace_id && i.status == status
        })))
    }

    async fn insert_decision(&self, decision: &Decision) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.decisions.push(decision.clone());
        self.commit(&tables).await
    }

    async fn list_decisions(&self, workspace_id: &str) -> Result<Vec<Decision>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .decisions
                .iter()
                .filter(|d| d.workspace_id() == workspace_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_decisions_for_idea(
        &self,
        idea_id: Uuid,
    ) -> Result<Vec<Decision>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .decisions
                .iter()
                .filter(|d| d.idea_id() == idea_id)
                .cloned()
                .collect(),
        ))
    }

    async fn upsert_metric(&self, metric: &Metric) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        match tables
            .metrics
            .iter_mut()
            .find(|m| m.workspace_id == metric.workspace_id && m.name == metric.name)
        {
            Some(existing) => *existing = metric.clone(),
            None => tables.metrics.push(metric.clone()),
        }
        self.commit(&tables).await
    }

    async fn list_metrics(&self, workspace_id: &str) -> Result<Vec<Metric>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut metrics: Vec<Metric> = tables
            .metrics
            .iter()
            .filter(|m| m.workspace_id == workspace_id)
            .cloned()
            .collect();
        metrics.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(metrics)
    }

    async fn log_activity(&self, entry: &ActivityLog) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.activity.push(entry.clone());
        self.commit(&tables).await
    }

    async fn list_activity(
        &self,
        workspace_id: &str,
        limit: usize,
    ) -> Result<Vec<ActivityLog>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut entries: Vec<ActivityLog> = tables
            .activity
            .iter()
            .filter(|a| a.workspace_id == workspace_id)
            .cloned()
            .collect();
        entries.sort_by_key(|a| std::cmp::Reverse(a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn apply_merge(&self, plan: &MergePlan) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;

        // Validate every row first so a failure leaves nothing half-applied.
        for idea in std::iter::once(&plan.target).chain(plan.sources.iter()) {
            if !tables.ideas.contains_key(&idea.id) {
                return Err(DatabaseError::Transaction(
                    DatabaseError::idea_not_found(idea.id).to_string(),
                ));
            }
        }

        for idea in std::iter::once(&plan.target).chain(plan.sources.iter()) {
            tables.ideas.insert(idea.id, idea.clone());
        }
        tables.decisions.extend(plan.decisions.iter().cloned());
        tables.activity.push(plan.activity.clone());
        self.commit(&tables).await
    }
}

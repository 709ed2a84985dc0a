//! Idea service: an in-memory view of one workspace over a [`Store`].
//!
//! Transitions are applied to the cache first and then persisted. If the
//! idea write fails, the cache entry is restored to the snapshot taken just
//! before the mutation. Side effects already written (the activity entry)
//! are not undone. Last write wins; there are no version checks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{DatabaseError, Result, ValidationError};
use crate::ideas::lifecycle::{self, Transition};
use crate::ideas::merge::merge_ideas;
use crate::ideas::model::{ActivityLog, Decision, Idea, IdeaStatus, Trigger};
use crate::ideas::triggers::{FiredTrigger, evaluate_triggers};
use crate::store::Store;
use crate::wake::{Scorer, SmartWakeRecommendation};

const DEFAULT_ACTOR: &str = "user";

pub struct IdeaService {
    store: Arc<dyn Store>,
    scorer: Arc<dyn Scorer>,
    workspace_id: String,
    actor: String,
    cache: RwLock<HashMap<Uuid, Idea>>,
}

impl IdeaService {
    pub fn new(
        store: Arc<dyn Store>,
        scorer: Arc<dyn Scorer>,
        workspace_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            scorer,
            workspace_id: workspace_id.into(),
            actor: DEFAULT_ACTOR.to_string(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Name recorded as `decided_by` on decisions.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Replace the cache with the store's current view of the workspace.
    pub async fn load(&self) -> Result<usize> {
        let ideas = self.store.list_ideas(&self.workspace_id).await?;
        let count = ideas.len();
        let mut cache = self.cache.write().await;
        *cache = ideas.into_iter().map(|i| (i.id, i)).collect();
        info!(workspace = %self.workspace_id, count, "Idea cache loaded");
        Ok(count)
    }

    /// Cached ideas, oldest first.
    pub async fn ideas(&self) -> Vec<Idea> {
        let cache = self.cache.read().await;
        let mut ideas: Vec<Idea> = cache.values().cloned().collect();
        ideas.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        ideas
    }

    /// Cached idea, falling back to the store.
    pub async fn get(&self, id: Uuid) -> Result<Idea> {
        if let Some(idea) = self.cache.read().await.get(&id) {
            return Ok(idea.clone());
        }
        let idea = self
            .store
            .get_idea(id)
            .await?
            .ok_or_else(|| DatabaseError::idea_not_found(id))?;
        if idea.workspace_id != self.workspace_id {
            return Err(ValidationError::WrongWorkspace {
                id,
                workspace_id: self.workspace_id.clone(),
            }
            .into());
        }
        self.cache.write().await.insert(id, idea.clone());
        Ok(idea)
    }

    /// Add a new idea. On a failed write the cache forgets it again.
    pub async fn create(&self, mut idea: Idea, now: DateTime<Utc>) -> Result<Idea> {
        idea.workspace_id = self.workspace_id.clone();
        lifecycle::validate_new(&idea)?;

        self.cache.write().await.insert(idea.id, idea.clone());
        if let Err(e) = self.store.create_idea(&idea).await {
            error!(id = %idea.id, error = %e, "Failed to create idea, rolling back");
            self.cache.write().await.remove(&idea.id);
            return Err(e.into());
        }

        let activity = ActivityLog::new(
            self.workspace_id.clone(),
            Some(idea.id),
            "created",
            format!("\"{}\" added", idea.title),
            now,
        );
        if let Err(e) = self.store.log_activity(&activity).await {
            warn!(id = %idea.id, error = %e, "Failed to log idea creation");
        }
        Ok(idea)
    }

    pub async fn freeze(
        &self,
        id: Uuid,
        trigger: Trigger,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Idea> {
        let actor = self.actor.clone();
        self.apply(id, |idea| lifecycle::freeze(idea, trigger, reason, &actor, now))
            .await
    }

    pub async fn wake(&self, id: Uuid, reason: &str, now: DateTime<Utc>) -> Result<Idea> {
        let actor = self.actor.clone();
        self.apply(id, |idea| lifecycle::wake(idea, reason, &actor, now))
            .await
    }

    pub async fn kill(&self, id: Uuid, reason: &str, now: DateTime<Utc>) -> Result<Idea> {
        let actor = self.actor.clone();
        self.apply(id, |idea| lifecycle::kill(idea, reason, &actor, now))
            .await
    }

    pub async fn vote(&self, id: Uuid, user: &str, tag: &str, now: DateTime<Utc>) -> Result<Idea> {
        self.apply(id, |idea| lifecycle::vote(idea, user, tag, now))
            .await
    }

    /// Optimistic transition with snapshot rollback.
    ///
    /// Order of writes: activity, idea, decision. Only the idea is rolled
    /// back in the cache when its write fails.
    async fn apply<F>(&self, id: Uuid, mutate: F) -> Result<Idea>
    where
        F: FnOnce(&mut Idea) -> std::result::Result<Transition, ValidationError>,
    {
        let snapshot = self.get(id).await?;
        let mut updated = snapshot.clone();
        let transition = mutate(&mut updated)?;

        self.cache.write().await.insert(id, updated.clone());

        if let Err(e) = self.store.log_activity(&transition.activity).await {
            warn!(id = %id, error = %e, "Failed to log activity");
        }

        if let Err(e) = self.store.update_idea(&updated).await {
            error!(id = %id, error = %e, "Idea write failed, restoring snapshot");
            self.cache.write().await.insert(id, snapshot);
            return Err(e.into());
        }

        if let Some(decision) = &transition.decision {
            self.store.insert_decision(decision).await?;
        }

        info!(
            id = %id,
            status = %updated.status,
            action = %transition.activity.action,
            "Idea updated"
        );
        Ok(updated)
    }

    /// Merge sources into a target in one transaction, then refresh the cache.
    pub async fn merge(
        &self,
        target_id: Uuid,
        source_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<Idea> {
        let merged = merge_ideas(
            self.store.as_ref(),
            &self.workspace_id,
            target_id,
            source_ids,
            &self.actor,
            now,
        )
        .await?;

        let mut refreshed = Vec::with_capacity(source_ids.len());
        for id in source_ids {
            if let Some(idea) = self.store.get_idea(*id).await?
                && idea.workspace_id == self.workspace_id
            {
                refreshed.push(idea);
            }
        }
        let mut cache = self.cache.write().await;
        cache.insert(merged.id, merged.clone());
        for idea in refreshed {
            cache.insert(idea.id, idea);
        }
        Ok(merged)
    }

    /// Smart Wake over the workspace's frozen ideas and current metrics.
    pub async fn recommendations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<SmartWakeRecommendation>> {
        let frozen = self
            .store
            .list_ideas_by_status(&self.workspace_id, IdeaStatus::Frozen)
            .await?;
        let metrics = self.store.list_metrics(&self.workspace_id).await?;
        let recs = self.scorer.recommend(&frozen, &metrics, now).await;
        info!(
            scorer = self.scorer.name(),
            frozen = frozen.len(),
            recommended = recs.len(),
            "Smart Wake computed"
        );
        Ok(recs)
    }

    /// Frozen ideas whose trigger currently holds.
    pub async fn check_triggers(
        &self,
        signals: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<FiredTrigger>> {
        let frozen = self
            .store
            .list_ideas_by_status(&self.workspace_id, IdeaStatus::Frozen)
            .await?;
        let metrics = self.store.list_metrics(&self.workspace_id).await?;
        Ok(evaluate_triggers(&frozen, &metrics, signals, now))
    }

    pub async fn decisions(&self) -> Result<Vec<Decision>> {
        Ok(self.store.list_decisions(&self.workspace_id).await?)
    }
}

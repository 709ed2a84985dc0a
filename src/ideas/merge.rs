//! Idea merge. Combines source ideas into a target and records lineage.
//!
//! Planning is pure; [`Store::apply_merge`] persists the whole plan in one
//! transaction so a partial failure cannot leave dangling lineage.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DatabaseError, ValidationError};
use crate::ideas::model::{
    ActivityLog, Decision, DecisionOutcome, DecisionType, Idea, IdeaStatus, LineageEntry,
    LineageKind,
};
use crate::store::Store;

/// Every write a merge performs, computed up front.
#[derive(Debug, Clone)]
pub struct MergePlan {
    /// Target after absorbing the sources.
    pub target: Idea,
    /// Sources after being killed.
    pub sources: Vec<Idea>,
    /// One decision per source.
    pub decisions: Vec<Decision>,
    pub activity: ActivityLog,
}

/// Compute the merged state of `target` and `sources`.
pub fn plan_merge(
    target: &Idea,
    sources: &[Idea],
    now: DateTime<Utc>,
    decided_by: &str,
) -> MergePlan {
    let mut merged_target = target.clone();
    let mut merged_sources = Vec::with_capacity(sources.len());
    let mut decisions = Vec::with_capacity(sources.len());

    for source in sources {
        merged_target.description.push_str(&format!(
            "\n\n--- Merged from \"{}\" ---\n{}",
            source.title, source.description
        ));
        merged_target.votes = merged_target.votes.saturating_add(source.votes);
        merged_target.lineage.push(LineageEntry {
            kind: LineageKind::Child,
            idea_id: source.id,
            idea_title: source.title.clone(),
            timestamp: now,
        });

        let mut killed = source.clone();
        killed.status = IdeaStatus::Killed;
        killed.archive_reason = Some(format!("Merged into idea: \"{}\"", target.title));
        killed.lineage.push(LineageEntry {
            kind: LineageKind::Parent,
            idea_id: target.id,
            idea_title: target.title.clone(),
            timestamp: now,
        });
        killed.updated_at = now;

        decisions.push(Decision::new(
            source.workspace_id.clone(),
            source.id,
            DecisionType::Merge,
            format!("Merged \"{}\" into \"{}\"", source.title, target.title),
            format!(
                "\"{}\" ({} votes) was merged into \"{}\".",
                source.title, source.votes, target.title
            ),
            DecisionOutcome::Modified,
            decided_by,
            now,
        ));
        merged_sources.push(killed);
    }
    merged_target.updated_at = now;

    let titles: Vec<&str> = sources.iter().map(|s| s.title.as_str()).collect();
    let activity = ActivityLog::new(
        target.workspace_id.clone(),
        Some(target.id),
        "merged",
        format!("Merged {} into \"{}\"", titles.join(", "), target.title),
        now,
    );

    MergePlan {
        target: merged_target,
        sources: merged_sources,
        decisions,
        activity,
    }
}

/// Merge `source_ids` into `target_id` and persist the result atomically.
///
/// Unknown source ids, duplicates, killed sources and the target's own id
/// are skipped. A missing target is an error, and so is a killed one. With
/// nothing to merge, the target is returned unchanged and nothing is written.
pub async fn merge_ideas(
    store: &dyn Store,
    workspace_id: &str,
    target_id: Uuid,
    source_ids: &[Uuid],
    decided_by: &str,
    now: DateTime<Utc>,
) -> Result<Idea, crate::error::Error> {
    let target = store
        .get_idea(target_id)
        .await?
        .ok_or_else(|| DatabaseError::idea_not_found(target_id))?;
    if target.workspace_id != workspace_id {
        return Err(ValidationError::WrongWorkspace {
            id: target_id,
            workspace_id: workspace_id.to_string(),
        }
        .into());
    }
    if target.status == IdeaStatus::Killed {
        return Err(ValidationError::InvalidTransition {
            id: target_id,
            current: target.status.to_string(),
            action: "merge into",
        }
        .into());
    }

    let mut seen = HashSet::from([target_id]);
    let mut sources = Vec::with_capacity(source_ids.len());
    for &id in source_ids {
        if !seen.insert(id) {
            continue;
        }
        match store.get_idea(id).await? {
            Some(source) if source.workspace_id != workspace_id => {
                debug!(source_id = %id, "Skipping merge source from another workspace")
            }
            Some(source) if source.status == IdeaStatus::Killed => {
                debug!(source_id = %id, "Skipping killed merge source")
            }
            Some(source) => sources.push(source),
            None => debug!(source_id = %id, "Skipping unknown merge source"),
        }
    }

    if sources.is_empty() {
        debug!(target_id = %target_id, "Nothing to merge");
        return Ok(target);
    }

    let plan = plan_merge(&target, &sources, now, decided_by);
    store.apply_merge(&plan).await?;

    info!(
        target_id = %target_id,
        sources = plan.sources.len(),
        votes = plan.target.votes,
        "Ideas merged"
    );
    Ok(plan.target)
}

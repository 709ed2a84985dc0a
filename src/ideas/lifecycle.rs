//! Idea state transitions: freeze, wake, kill, vote.
//!
//! Each transition mutates an `Idea` in place after validating it, and
//! returns the audit records the caller must persist alongside it.

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::ideas::model::{
    ActivityLog, Decision, DecisionOutcome, DecisionType, Idea, IdeaStatus, Trigger, Vote,
};

/// Audit records produced by a transition.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Votes do not produce a decision.
    pub decision: Option<Decision>,
    pub activity: ActivityLog,
}

/// Check a new idea before it is written.
pub fn validate_new(idea: &Idea) -> Result<(), ValidationError> {
    if idea.title.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "title" });
    }
    if idea.workspace_id.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            field: "workspace_id",
        });
    }
    Ok(())
}

fn invalid(idea: &Idea, action: &'static str) -> ValidationError {
    ValidationError::InvalidTransition {
        id: idea.id,
        current: idea.status.to_string(),
        action,
    }
}

fn decision(
    idea: &Idea,
    decision_type: DecisionType,
    title: String,
    content: &str,
    outcome: DecisionOutcome,
    decided_by: &str,
    now: DateTime<Utc>,
) -> Decision {
    Decision::new(
        idea.workspace_id.clone(),
        idea.id,
        decision_type,
        title,
        content,
        outcome,
        decided_by,
        now,
    )
}

/// Freeze an active or in-progress idea until `trigger` fires.
pub fn freeze(
    idea: &mut Idea,
    trigger: Trigger,
    reason: &str,
    decided_by: &str,
    now: DateTime<Utc>,
) -> Result<Transition, ValidationError> {
    if !matches!(idea.status, IdeaStatus::Active | IdeaStatus::InProgress) {
        return Err(invalid(idea, "freeze"));
    }
    if reason.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            field: "dormancy_reason",
        });
    }

    idea.status = IdeaStatus::Frozen;
    idea.is_dormant = true;
    idea.dormancy_reason = Some(reason.to_string());
    idea.trigger = trigger;
    idea.updated_at = now;

    Ok(Transition {
        decision: Some(decision(
            idea,
            DecisionType::Freeze,
            format!("Froze \"{}\"", idea.title),
            reason,
            DecisionOutcome::Deferred,
            decided_by,
            now,
        )),
        activity: ActivityLog::new(
            idea.workspace_id.clone(),
            Some(idea.id),
            "frozen",
            format!("\"{}\" frozen: {reason}", idea.title),
            now,
        ),
    })
}

/// Thaw a frozen idea back to active.
pub fn wake(
    idea: &mut Idea,
    reason: &str,
    decided_by: &str,
    now: DateTime<Utc>,
) -> Result<Transition, ValidationError> {
    if idea.status != IdeaStatus::Frozen {
        return Err(invalid(idea, "wake"));
    }

    idea.status = IdeaStatus::Active;
    idea.is_dormant = false;
    idea.dormancy_reason = None;
    idea.trigger = Trigger::None;
    idea.updated_at = now;

    Ok(Transition {
        decision: Some(decision(
            idea,
            DecisionType::Wake,
            format!("Woke \"{}\"", idea.title),
            reason,
            DecisionOutcome::Approved,
            decided_by,
            now,
        )),
        activity: ActivityLog::new(
            idea.workspace_id.clone(),
            Some(idea.id),
            "woken",
            format!("\"{}\" woken", idea.title),
            now,
        ),
    })
}

/// Kill an idea. Killing is terminal.
pub fn kill(
    idea: &mut Idea,
    reason: &str,
    decided_by: &str,
    now: DateTime<Utc>,
) -> Result<Transition, ValidationError> {
    if idea.status == IdeaStatus::Killed {
        return Err(invalid(idea, "kill"));
    }

    idea.status = IdeaStatus::Killed;
    idea.is_dormant = false;
    idea.archive_reason = Some(reason.to_string());
    idea.updated_at = now;

    Ok(Transition {
        decision: Some(decision(
            idea,
            DecisionType::Kill,
            format!("Killed \"{}\"", idea.title),
            reason,
            DecisionOutcome::Rejected,
            decided_by,
            now,
        )),
        activity: ActivityLog::new(
            idea.workspace_id.clone(),
            Some(idea.id),
            "killed",
            format!("\"{}\" killed", idea.title),
            now,
        ),
    })
}

/// Record a vote. The vote list is append-only.
pub fn vote(
    idea: &mut Idea,
    user: &str,
    tag: &str,
    now: DateTime<Utc>,
) -> Result<Transition, ValidationError> {
    if user.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "user" });
    }
    if idea.status == IdeaStatus::Killed {
        return Err(invalid(idea, "vote on"));
    }

    idea.votes = idea.votes.saturating_add(1);
    idea.vote_records.push(Vote {
        user: user.to_string(),
        tag: tag.to_string(),
        timestamp: now,
    });
    idea.updated_at = now;

    Ok(Transition {
        decision: None,
        activity: ActivityLog::new(
            idea.workspace_id.clone(),
            Some(idea.id),
            "voted",
            format!("{user} voted for \"{}\" ({tag})", idea.title),
            now,
        ),
    })
}

//! Trigger evaluation for frozen ideas.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::ideas::model::{Idea, IdeaStatus, Metric, Trigger};

/// A frozen idea whose trigger condition currently holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiredTrigger {
    pub idea_id: Uuid,
    pub title: String,
    pub reason: String,
}

/// Check every frozen idea's trigger against the clock, the metric snapshot,
/// and free-text external signals (market pulses, news headlines).
pub fn evaluate_triggers(
    ideas: &[Idea],
    metrics: &[Metric],
    signals: &[String],
    now: DateTime<Utc>,
) -> Vec<FiredTrigger> {
    ideas
        .iter()
        .filter(|idea| idea.status == IdeaStatus::Frozen)
        .filter_map(|idea| {
            let reason = match &idea.trigger {
                Trigger::None => None,
                Trigger::Time { date } => {
                    (now >= *date).then(|| format!("Scheduled date {} reached", date.date_naive()))
                }
                Trigger::Metric { condition } => metrics
                    .iter()
                    .find(|m| m.matches(condition) && m.near_target())
                    .map(|m| {
                        format!(
                            "{} at {} of {} target",
                            m.name, m.current_value, m.target_value
                        )
                    }),
                Trigger::External { keyword } => {
                    let needle = keyword.trim().to_lowercase();
                    (!needle.is_empty()
                        && signals.iter().any(|s| s.to_lowercase().contains(&needle)))
                    .then(|| format!("External signal mentioned \"{}\"", keyword.trim()))
                }
            }?;
            Some(FiredTrigger {
                idea_id: idea.id,
                title: idea.title.clone(),
                reason,
            })
        })
        .collect()
}

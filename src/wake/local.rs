//! Deterministic Smart Wake heuristic.
//!
//! Score out of 100:
//! - votes: `min(votes * 10, 30)`
//! - age: `min(age_days * 2, 20)`
//! - metric trigger: `+30` when the trigger names a metric at 80% of target
//! - priority: High `+20`, Medium `+10`, Low `+0`

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ideas::model::{Idea, Metric, Priority};
use crate::wake::{Scorer, SmartWakeRecommendation, SuggestedAction, rank};

const VOTE_WEIGHT: u32 = 10;
const VOTE_CAP: u32 = 30;
const AGE_WEIGHT: u32 = 2;
const AGE_CAP: u32 = 20;
const METRIC_BONUS: u32 = 30;
const HIGH_INTEREST_VOTES: u32 = 3;
const LONG_FROZEN_DAYS: u32 = 30;

const FALLBACK_REASON: &str = "Regular review recommended.";

fn priority_bonus(priority: Priority) -> u32 {
    match priority {
        Priority::High => 20,
        Priority::Medium => 10,
        Priority::Low => 0,
    }
}

/// Score a single idea against the metric snapshot.
pub fn score_idea(idea: &Idea, metrics: &[Metric], now: DateTime<Utc>) -> SmartWakeRecommendation {
    let age = idea.age_days(now);
    let linked = idea
        .trigger_metric()
        .and_then(|condition| metrics.iter().find(|m| m.matches(condition) && m.near_target()));

    let total = idea.votes.saturating_mul(VOTE_WEIGHT).min(VOTE_CAP)
        + age.saturating_mul(AGE_WEIGHT).min(AGE_CAP)
        + linked.map_or(0, |_| METRIC_BONUS)
        + priority_bonus(idea.priority);
    let score = total.min(100) as u8;

    let mut clauses = Vec::new();
    if idea.votes >= HIGH_INTEREST_VOTES {
        clauses.push("High team interest".to_string());
    }
    if idea.priority == Priority::High {
        clauses.push("High priority".to_string());
    }
    if let Some(metric) = linked {
        clauses.push(format!("Linked to {} metric", metric.name));
    }
    if age > LONG_FROZEN_DAYS {
        clauses.push("Been frozen for over a month".to_string());
    }
    let reason = if clauses.is_empty() {
        FALLBACK_REASON.to_string()
    } else {
        clauses.join(", ")
    };

    SmartWakeRecommendation {
        idea_id: idea.id,
        score,
        reason,
        suggested_action: SuggestedAction::for_score(score),
    }
}

/// Score every idea and keep the top three.
pub fn rank_locally(
    frozen: &[Idea],
    metrics: &[Metric],
    now: DateTime<Utc>,
) -> Vec<SmartWakeRecommendation> {
    let mut recs: Vec<_> = frozen.iter().map(|i| score_idea(i, metrics, now)).collect();
    rank(&mut recs);
    recs
}

/// The deterministic fallback strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHeuristicScorer;

#[async_trait]
impl Scorer for LocalHeuristicScorer {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn recommend(
        &self,
        frozen: &[Idea],
        metrics: &[Metric],
        now: DateTime<Utc>,
    ) -> Vec<SmartWakeRecommendation> {
        rank_locally(frozen, metrics, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ideas::model::Trigger;
    use chrono::Duration;

    fn idea(votes: u32, priority: Priority, age_days: i64, now: DateTime<Utc>) -> Idea {
        Idea::new("ws1", "Idea")
            .with_votes(votes)
            .with_priority(priority)
            .with_created_at(now - Duration::days(age_days))
            .frozen("later")
    }

    fn scenario(now: DateTime<Utc>) -> (Idea, Idea, Vec<Metric>) {
        let a = idea(5, Priority::High, 40, now).with_trigger(Trigger::Metric {
            condition: "MAU".into(),
        });
        let b = idea(0, Priority::Low, 2, now);
        let metrics = vec![Metric::new("ws1", "MAU", 4200.0, 5000.0)];
        (a, b, metrics)
    }

    #[test]
    fn end_to_end_scenario_scores() {
        let now = Utc::now();
        let (a, b, metrics) = scenario(now);

        let ra = score_idea(&a, &metrics, now);
        assert_eq!(ra.score, 100);
        assert_eq!(
            ra.reason,
            "High team interest, High priority, Linked to MAU metric, Been frozen for over a month"
        );
        assert_eq!(ra.suggested_action, SuggestedAction::Wake);

        let rb = score_idea(&b, &metrics, now);
        assert_eq!(rb.score, 4);
        assert_eq!(rb.reason, FALLBACK_REASON);
        assert_eq!(rb.suggested_action, SuggestedAction::KeepFrozen);

        let ranked = rank_locally(&[b.clone(), a.clone()], &metrics, now);
        assert_eq!(ranked[0].idea_id, a.id);
        assert_eq!(ranked[1].idea_id, b.id);
    }

    #[test]
    fn metric_bonus_requires_eighty_percent() {
        let now = Utc::now();
        let idea = idea(0, Priority::Low, 0, now).with_trigger(Trigger::Metric {
            condition: "monthly mau".into(),
        });
        let below = [Metric::new("ws1", "MAU", 3999.0, 5000.0)];
        let at = [Metric::new("ws1", "MAU", 4000.0, 5000.0)];
        assert_eq!(score_idea(&idea, &below, now).score, 0);
        assert_eq!(score_idea(&idea, &at, now).score, 30);
    }

    #[test]
    fn contributions_are_capped() {
        let now = Utc::now();
        let many_votes = idea(50, Priority::Low, 0, now);
        assert_eq!(score_idea(&many_votes, &[], now).score, 30);
        let ancient = idea(0, Priority::Low, 3650, now);
        assert_eq!(score_idea(&ancient, &[], now).score, 20);
        let medium = idea(0, Priority::Medium, 0, now);
        assert_eq!(score_idea(&medium, &[], now).score, 10);
    }

    #[test]
    fn future_created_at_counts_as_zero_age() {
        let now = Utc::now();
        let idea = idea(0, Priority::Low, -10, now);
        assert_eq!(score_idea(&idea, &[], now).score, 0);
    }

    #[test]
    fn age_clause_needs_more_than_thirty_days() {
        let now = Utc::now();
        let thirty = idea(0, Priority::Low, 30, now);
        assert_eq!(score_idea(&thirty, &[], now).reason, FALLBACK_REASON);
        let thirty_one = idea(0, Priority::Low, 31, now);
        assert_eq!(
            score_idea(&thirty_one, &[], now).reason,
            "Been frozen for over a month"
        );
    }

    #[test]
    fn deterministic_bounded_and_capped() {
        let now = Utc::now();
        let ideas: Vec<Idea> = (0..7)
            .map(|i| idea(i, Priority::Medium, i as i64 * 5, now))
            .collect();
        let first = rank_locally(&ideas, &[], now);
        let second = rank_locally(&ideas, &[], now);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|r| r.score <= 100));
        assert!(first.windows(2).all(|w| w[0].score >= w[1].score));

        assert_eq!(rank_locally(&ideas[..2], &[], now).len(), 2);
    }

    #[tokio::test]
    async fn empty_input_returns_empty() {
        let recs = LocalHeuristicScorer.recommend(&[], &[], Utc::now()).await;
        assert!(recs.is_empty());
    }
}

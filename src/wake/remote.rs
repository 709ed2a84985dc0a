//! LLM-backed Smart Wake scorer with local fallback.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ParseError, Result};
use crate::ideas::model::{Idea, Metric};
use crate::llm::json::parse_array;
use crate::llm::{CompletionRequest, LlmProvider};
use crate::wake::local::{rank_locally, score_idea};
use crate::wake::{Scorer, SmartWakeRecommendation, SuggestedAction, rank};

/// One entry of the model's answer. Every field is optional on the wire.
#[derive(Debug, Deserialize)]
struct RawRecommendation {
    #[serde(default)]
    idea_id: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    suggested_action: Option<String>,
}

/// Asks an LLM to rank frozen ideas.
pub struct RemoteLlmScorer {
    provider: Arc<dyn LlmProvider>,
}

impl RemoteLlmScorer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    async fn try_recommend(
        &self,
        frozen: &[Idea],
        metrics: &[Metric],
        now: DateTime<Utc>,
    ) -> Result<Vec<SmartWakeRecommendation>> {
        let request = CompletionRequest::new(build_prompt(frozen, metrics, now))
            .with_temperature(0.2)
            .with_max_tokens(1024);
        let response = self.provider.complete(request).await?;
        let recs = validate(&response.content, frozen, metrics, now)?;
        Ok(recs)
    }
}

/// Build the ranking prompt from the frozen ideas and metric snapshot.
fn build_prompt(frozen: &[Idea], metrics: &[Metric], now: DateTime<Utc>) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(
        "You review an icebox of frozen product ideas and pick the ones most \
         worth reconsidering now.\n\nFrozen ideas:\n",
    );
    for idea in frozen {
        prompt.push_str(&format!(
            "- id: {} | title: {} | votes: {} | priority: {} | frozen for {} days",
            idea.id,
            idea.title,
            idea.votes,
            idea.priority.as_str(),
            idea.age_days(now)
        ));
        if let Some(metric) = idea.trigger_metric() {
            prompt.push_str(&format!(" | waiting on metric: {metric}"));
        }
        prompt.push('\n');
    }

    if !metrics.is_empty() {
        prompt.push_str("\nCurrent metrics:\n");
        for m in metrics {
            prompt.push_str(&format!(
                "- {}: {} / {} {}\n",
                m.name, m.current_value, m.target_value, m.unit
            ));
        }
    }

    prompt.push_str(
        "\nReturn at most 3 ideas as a JSON array, best first, and nothing else:\n\
         [{\"idea_id\": \"<id from the list>\", \"score\": <0-100>, \
         \"reason\": \"<one sentence>\", \
         \"suggested_action\": \"wake\" | \"review\" | \"keep_frozen\"}]\n",
    );
    prompt
}

/// Parse the model output and keep only entries about known ideas.
fn validate(
    raw: &str,
    frozen: &[Idea],
    metrics: &[Metric],
    now: DateTime<Utc>,
) -> std::result::Result<Vec<SmartWakeRecommendation>, ParseError> {
    let entries: Vec<RawRecommendation> = parse_array(raw)?;
    let known: HashMap<Uuid, &Idea> = frozen.iter().map(|i| (i.id, i)).collect();
    let mut seen = HashSet::new();
    let mut recs = Vec::new();

    for entry in entries {
        let Ok(id) = entry.idea_id.trim().parse::<Uuid>() else {
            debug!(idea_id = %entry.idea_id, "Discarding unparseable idea id from model");
            continue;
        };
        let Some(idea) = known.get(&id) else {
            debug!(%id, "Discarding unknown idea id from model");
            continue;
        };
        if !seen.insert(id) {
            continue;
        }

        let score = if entry.score.is_finite() {
            entry.score.round().clamp(0.0, 100.0) as u8
        } else {
            0
        };
        let reason = if entry.reason.trim().is_empty() {
            score_idea(idea, metrics, now).reason
        } else {
            entry.reason.trim().to_string()
        };
        let suggested_action = entry
            .suggested_action
            .as_deref()
            .and_then(SuggestedAction::parse_loose)
            .unwrap_or_else(|| SuggestedAction::for_score(score));

        recs.push(SmartWakeRecommendation {
            idea_id: id,
            score,
            reason,
            suggested_action,
        });
    }

    if recs.is_empty() {
        return Err(ParseError::NoKnownIds);
    }
    rank(&mut recs);
    Ok(recs)
}

#[async_trait]
impl Scorer for RemoteLlmScorer {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn recommend(
        &self,
        frozen: &[Idea],
        metrics: &[Metric],
        now: DateTime<Utc>,
    ) -> Vec<SmartWakeRecommendation> {
        if frozen.is_empty() {
            return Vec::new();
        }
        match self.try_recommend(frozen, metrics, now).await {
            Ok(recs) => {
                info!(
                    model = self.provider.model_name(),
                    count = recs.len(),
                    "Smart Wake ranked by LLM"
                );
                recs
            }
            Err(e) => {
                warn!(error = %e, "Smart Wake LLM ranking failed, using local heuristic");
                rank_locally(frozen, metrics, now)
            }
        }
    }
}

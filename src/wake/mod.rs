//! Smart Wake: rank frozen ideas that look ready to reconsider.
//!
//! Two strategies share the [`Scorer`] contract:
//! - [`LocalHeuristicScorer`]: deterministic weighted score out of 100
//! - [`RemoteLlmScorer`]: asks an LLM, validates its answer, and falls back
//!   to the local heuristic on any failure
//!
//! The strategy is picked once at startup by [`build_scorer`].

pub mod local;
pub mod remote;

pub use local::LocalHeuristicScorer;
pub use remote::RemoteLlmScorer;

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ideas::model::{Idea, Metric};
use crate::llm::LlmProvider;

/// Maximum number of recommendations returned.
pub const MAX_RECOMMENDATIONS: usize = 3;

/// What the dashboard should suggest doing with a recommended idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Wake,
    Review,
    KeepFrozen,
}

impl SuggestedAction {
    /// Default action for a score: wake at 70+, review at 40+.
    pub fn for_score(score: u8) -> Self {
        if score >= 70 {
            Self::Wake
        } else if score >= 40 {
            Self::Review
        } else {
            Self::KeepFrozen
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wake => "wake",
            Self::Review => "review",
            Self::KeepFrozen => "keep_frozen",
        }
    }

    /// Lenient parse of model-supplied labels ("keep frozen", "Wake", ...).
    pub fn parse_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "wake" | "thaw" => Some(Self::Wake),
            "review" => Some(Self::Review),
            "keep_frozen" | "keep" | "freeze" => Some(Self::KeepFrozen),
            _ => None,
        }
    }
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A ranked suggestion to reconsider a frozen idea. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartWakeRecommendation {
    pub idea_id: Uuid,
    /// 0 to 100 inclusive.
    pub score: u8,
    pub reason: String,
    pub suggested_action: SuggestedAction,
}

/// Ranks frozen ideas. Infallible: implementations degrade instead of erroring.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    /// Up to [`MAX_RECOMMENDATIONS`] recommendations, highest score first.
    async fn recommend(
        &self,
        frozen: &[Idea],
        metrics: &[Metric],
        now: DateTime<Utc>,
    ) -> Vec<SmartWakeRecommendation>;
}

/// Score descending, then idea id ascending.
pub(crate) fn rank(recs: &mut Vec<SmartWakeRecommendation>) {
    recs.sort_by(|a, b| match b.score.cmp(&a.score) {
        Ordering::Equal => a.idea_id.cmp(&b.idea_id),
        other => other,
    });
    recs.truncate(MAX_RECOMMENDATIONS);
}

/// Pick the scoring strategy: remote when an LLM is configured, local otherwise.
pub fn build_scorer(provider: Option<Arc<dyn LlmProvider>>) -> Arc<dyn Scorer> {
    match provider {
        Some(provider) => Arc::new(RemoteLlmScorer::new(provider)),
        None => Arc::new(LocalHeuristicScorer),
    }
}

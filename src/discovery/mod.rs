//! Dormant-idea discovery over externally sourced pages (Notion).
//!
//! Pages are pulled from a [`PageSource`], classified in batches of five by a
//! [`Classifier`], and the hits are surfaced oldest first so the user can
//! triage them into the icebox.

pub mod keywords;
pub mod remote;
pub mod scanner;

pub use keywords::KeywordClassifier;
pub use remote::LlmClassifier;
pub use scanner::{DiscoveredIdea, DiscoveryReport, DiscoveryScanner, Triage, triage_discovered};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NotionError;
use crate::llm::LlmProvider;

/// Maximum pages per classification batch.
pub const BATCH_SIZE: usize = 5;

/// Length of the fallback summary, in characters.
pub const SUMMARY_CHARS: usize = 140;

/// A page pulled from an external workspace, flattened to plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageCandidate {
    pub id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub last_edited: DateTime<Utc>,
}

impl PageCandidate {
    /// Whole days since the last edit; never negative.
    pub fn dormant_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_edited).num_days().max(0)
    }

    /// First [`SUMMARY_CHARS`] characters of the content, or the title.
    pub fn fallback_summary(&self) -> String {
        let content = self.content.trim();
        let text = if content.is_empty() {
            self.title.trim()
        } else {
            content
        };
        text.chars().take(SUMMARY_CHARS).collect()
    }
}

/// Per-page verdict, index-aligned with the input batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub is_idea: bool,
    /// 0.0 to 1.0.
    pub confidence: f32,
    pub summary: String,
}

/// Decides which pages are dormant ideas. Infallible: remote strategies fall
/// back instead of erroring.
#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// One classification per page, in the same order.
    async fn classify_batch(
        &self,
        pages: &[PageCandidate],
        now: DateTime<Utc>,
    ) -> Vec<Classification>;
}

/// Somewhere pages come from.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Human-readable source name, used in dormancy reasons.
    fn name(&self) -> &str;

    async fn fetch_pages(&self) -> Result<Vec<PageCandidate>, NotionError>;
}

/// Pick the classifier: LLM when configured, keyword heuristic otherwise.
pub fn build_classifier(
    provider: Option<Arc<dyn LlmProvider>>,
    dormancy_days: i64,
) -> Arc<dyn Classifier> {
    let keywords = KeywordClassifier::new(dormancy_days);
    match provider {
        Some(provider) => Arc::new(LlmClassifier::new(provider, keywords)),
        None => Arc::new(keywords),
    }
}

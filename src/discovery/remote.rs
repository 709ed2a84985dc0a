//! LLM page classifier with per-batch keyword fallback.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::discovery::keywords::KeywordClassifier;
use crate::discovery::{Classification, Classifier, PageCandidate};
use crate::error::Result;
use crate::llm::json::parse_object;
use crate::llm::{CompletionRequest, LlmProvider};

/// Minimum model confidence for a page to count as an idea.
const ACCEPT_CONFIDENCE: f32 = 0.6;

/// Characters of page content sent to the model per page.
const CONTENT_PREVIEW_CHARS: usize = 800;

#[derive(Debug, Deserialize)]
struct RawBatch {
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    index: usize,
    #[serde(default)]
    is_idea: bool,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    summary: String,
}

/// Classifies a batch with one LLM call.
pub struct LlmClassifier {
    provider: Arc<dyn LlmProvider>,
    fallback: KeywordClassifier,
}

impl LlmClassifier {
    pub fn new(provider: Arc<dyn LlmProvider>, fallback: KeywordClassifier) -> Self {
        Self { provider, fallback }
    }

    async fn try_classify(
        &self,
        pages: &[PageCandidate],
        now: DateTime<Utc>,
    ) -> Result<Vec<Classification>> {
        let request = CompletionRequest::new(build_prompt(pages, now))
            .with_temperature(0.1)
            .with_max_tokens(1024);
        let response = self.provider.complete(request).await?;
        let batch: RawBatch = parse_object(&response.content)?;
        Ok(merge_results(pages, batch))
    }
}

fn build_prompt(pages: &[PageCandidate], now: DateTime<Utc>) -> String {
    let mut prompt = String::with_capacity(2048);
    prompt.push_str(
        "Decide which of these workspace pages describe a product or project idea \
         that was written down and then left dormant. Meeting notes, agendas and \
         reference documentation are not ideas.\n\n",
    );
    for (index, page) in pages.iter().enumerate() {
        let preview: String = page.content.chars().take(CONTENT_PREVIEW_CHARS).collect();
        prompt.push_str(&format!(
            "[{index}] Title: {}\nLast edited {} days ago\n{}\n\n",
            page.title,
            page.dormant_days(now),
            preview
        ));
    }
    prompt.push_str(
        "Respond with a JSON object only:\n\
         {\"results\": [{\"index\": <page number>, \"is_idea\": true|false, \
         \"confidence\": <0.0-1.0>, \"summary\": \"<one sentence>\"}]}\n",
    );
    prompt
}

/// Align model results with the input pages. Pages without a result, and
/// results below the confidence bar, are not ideas.
fn merge_results(pages: &[PageCandidate], batch: RawBatch) -> Vec<Classification> {
    let mut out: Vec<Classification> = pages
        .iter()
        .map(|p| Classification {
            is_idea: false,
            confidence: 0.0,
            summary: p.fallback_summary(),
        })
        .collect();

    for result in batch.results {
        let Some(slot) = out.get_mut(result.index) else {
            debug!(index = result.index, "Ignoring out-of-range classification");
            continue;
        };
        let confidence = if result.confidence.is_finite() {
            result.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        slot.is_idea = result.is_idea && confidence > ACCEPT_CONFIDENCE;
        slot.confidence = confidence;
        if !result.summary.trim().is_empty() {
            slot.summary = result.summary.trim().to_string();
        }
    }
    out
}

#[async_trait]
impl Classifier for LlmClassifier {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn classify_batch(
        &self,
        pages: &[PageCandidate],
        now: DateTime<Utc>,
    ) -> Vec<Classification> {
        if pages.is_empty() {
            return Vec::new();
        }
        match self.try_classify(pages, now).await {
            Ok(results) => results,
            Err(e) => {
                warn!(
                    error = %e,
                    pages = pages.len(),
                    "LLM classification failed, using keyword heuristic for batch"
                );
                self.fallback.classify_batch(pages, now).await
            }
        }
    }
}

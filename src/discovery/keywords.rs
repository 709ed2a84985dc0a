//! Keyword heuristic for dormant-idea detection.
//!
//! A page is a dormant idea iff its lowercased title and content contain an
//! idea signal, contain no negative signal, and it has not been edited for
//! more than the dormancy threshold.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::discovery::{Classification, Classifier, PageCandidate};

/// Default dormancy threshold in days.
pub const DEFAULT_DORMANCY_DAYS: i64 = 30;

const MATCH_CONFIDENCE: f32 = 0.7;

const IDEA_KEYWORDS: &[&str] = &[
    "idea",
    "proposal",
    "project plan",
    "brainstorm",
    "concept",
    "feature request",
    "what if",
    "someday",
    "prototype",
    "side project",
    "roadmap",
    "pitch",
    "아이디어",
    "기획",
    "제안",
    "구상",
    "브레인스토밍",
    "프로젝트 계획",
    "사이드 프로젝트",
];

const NEGATIVE_KEYWORDS: &[&str] = &[
    "meeting notes",
    "meeting minutes",
    "minutes",
    "agenda",
    "standup",
    "documentation",
    "docs",
    "manual",
    "how-to",
    "template",
    "changelog",
    "회의록",
    "회의",
    "안건",
    "문서",
    "매뉴얼",
    "가이드",
    "템플릿",
];

/// Deterministic keyword classifier.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    dormancy_days: i64,
}

impl KeywordClassifier {
    pub fn new(dormancy_days: i64) -> Self {
        Self { dormancy_days }
    }

    pub fn classify(&self, page: &PageCandidate, now: DateTime<Utc>) -> Classification {
        let text = format!("{}\n{}", page.title, page.content).to_lowercase();
        let has_signal = IDEA_KEYWORDS.iter().any(|k| text.contains(k));
        let has_negative = NEGATIVE_KEYWORDS.iter().any(|k| text.contains(k));
        let dormant = (now - page.last_edited).num_days() > self.dormancy_days;

        let is_idea = has_signal && !has_negative && dormant;
        Classification {
            is_idea,
            confidence: if is_idea { MATCH_CONFIDENCE } else { 0.0 },
            summary: page.fallback_summary(),
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_DORMANCY_DAYS)
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    fn name(&self) -> &'static str {
        "keywords"
    }

    async fn classify_batch(
        &self,
        pages: &[PageCandidate],
        now: DateTime<Utc>,
    ) -> Vec<Classification> {
        pages.iter().map(|p| self.classify(p, now)).collect()
    }
}

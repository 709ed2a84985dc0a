//! Batch scanner: pull pages, classify in paced batches, triage the results.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::discovery::{BATCH_SIZE, Classifier, PageSource};
use crate::error::Result;
use crate::ideas::lifecycle::validate_new;
use crate::ideas::model::{ActivityLog, Idea};
use crate::store::Store;

/// Default pause between classification batches.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(200);

/// A page judged to be a dormant idea. Ephemeral until triaged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredIdea {
    pub id: String,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub source: String,
    pub source_url: String,
    pub last_edited: DateTime<Utc>,
    pub dormant_days: i64,
    pub confidence: f32,
}

/// Result of one scan, sorted oldest edit first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    pub ideas: Vec<DiscoveredIdea>,
    pub pages_scanned: usize,
    pub batches: usize,
}

impl DiscoveryReport {
    /// The longest-dormant discovered idea.
    pub fn oldest(&self) -> Option<&DiscoveredIdea> {
        self.ideas.first()
    }
}

/// Walks a page source and classifies it batch by batch.
pub struct DiscoveryScanner {
    source: Arc<dyn PageSource>,
    classifier: Arc<dyn Classifier>,
    batch_size: usize,
    batch_delay: Duration,
}

impl DiscoveryScanner {
    pub fn new(source: Arc<dyn PageSource>, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            source,
            classifier,
            batch_size: BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Clamped to `1..=BATCH_SIZE`.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.clamp(1, BATCH_SIZE);
        self
    }

    /// Fetch every page and classify. Batches run strictly one after another.
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<DiscoveryReport> {
        let pages = self.source.fetch_pages().await?;
        let source_name = self.source.name().to_string();
        info!(
            source = %source_name,
            pages = pages.len(),
            classifier = self.classifier.name(),
            "Scanning for dormant ideas"
        );

        let mut report = DiscoveryReport {
            pages_scanned: pages.len(),
            ..Default::default()
        };
        let batch_count = pages.len().div_ceil(self.batch_size);

        for (i, batch) in pages.chunks(self.batch_size).enumerate() {
            let verdicts = self.classifier.classify_batch(batch, now).await;
            report.batches += 1;

            for (page, verdict) in batch.iter().zip(verdicts) {
                if !verdict.is_idea {
                    continue;
                }
                debug!(page = %page.id, confidence = verdict.confidence, "Dormant idea found");
                report.ideas.push(DiscoveredIdea {
                    id: page.id.clone(),
                    title: page.title.clone(),
                    content: page.content.clone(),
                    summary: verdict.summary,
                    source: source_name.clone(),
                    source_url: page.url.clone(),
                    last_edited: page.last_edited,
                    dormant_days: page.dormant_days(now),
                    confidence: verdict.confidence,
                });
            }

            if i + 1 < batch_count && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        report
            .ideas
            .sort_by(|a, b| b.dormant_days.cmp(&a.dormant_days));
        info!(found = report.ideas.len(), "Discovery scan complete");
        Ok(report)
    }
}

/// Where the user files a discovered idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Triage {
    Active,
    Frozen,
    Discarded,
}

/// Turn a discovered idea into a real one. `Discarded` writes nothing.
pub async fn triage_discovered(
    store: &dyn Store,
    workspace_id: &str,
    discovered: &DiscoveredIdea,
    triage: Triage,
    now: DateTime<Utc>,
) -> Result<Option<Idea>> {
    if triage == Triage::Discarded {
        debug!(page = %discovered.id, "Discovered idea discarded");
        return Ok(None);
    }

    let mut description = discovered.content.trim().to_string();
    if !discovered.source_url.is_empty() {
        if !description.is_empty() {
            description.push_str("\n\n");
        }
        description.push_str(&format!("Source: {}", discovered.source_url));
    }

    let mut idea = Idea::new(workspace_id, discovered.title.trim())
        .with_description(description)
        .with_category("discovered")
        .with_created_at(now);
    if triage == Triage::Frozen {
        idea = idea.frozen(format!(
            "Dormant for {} days in {}",
            discovered.dormant_days, discovered.source
        ));
    }
    validate_new(&idea)?;

    store.create_idea(&idea).await?;
    store
        .log_activity(&ActivityLog::new(
            workspace_id,
            Some(idea.id),
            "discovered",
            format!("\"{}\" imported from {}", idea.title, discovered.source),
            now,
        ))
        .await?;
    info!(id = %idea.id, status = %idea.status, "Discovered idea triaged");
    Ok(Some(idea))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{Classification, KeywordClassifier, PageCandidate};
    use crate::error::NotionError;
    use crate::ideas::model::IdeaStatus;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex;
    use std::time::Instant;

    struct StaticSource(Vec<PageCandidate>);

    #[async_trait]
    impl PageSource for StaticSource {
        fn name(&self) -> &str {
            "Notion"
        }

        async fn fetch_pages(&self) -> std::result::Result<Vec<PageCandidate>, NotionError> {
            Ok(self.0.clone())
        }
    }

    /// Records batch sizes and marks every page as an idea.
    #[derive(Default)]
    struct RecordingClassifier {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Classifier for RecordingClassifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn classify_batch(
            &self,
            pages: &[PageCandidate],
            _now: DateTime<Utc>,
        ) -> Vec<Classification> {
            self.batches.lock().unwrap().push(pages.len());
            pages
                .iter()
                .map(|p| Classification {
                    is_idea: true,
                    confidence: 0.9,
                    summary: p.title.clone(),
                })
                .collect()
        }
    }

    fn page(id: &str, content: &str, days_ago: i64, now: DateTime<Utc>) -> PageCandidate {
        PageCandidate {
            id: id.into(),
            title: format!("Page {id}"),
            content: content.into(),
            url: format!("https://notion.so/{id}"),
            last_edited: now - ChronoDuration::days(days_ago),
        }
    }

    #[tokio::test]
    async fn batches_of_five_sorted_oldest_first() {
        let now = Utc::now();
        let pages: Vec<_> = (0..12)
            .map(|i| page(&i.to_string(), "", 10 + (i * 7) % 13, now))
            .collect();
        let classifier = Arc::new(RecordingClassifier::default());
        let scanner = DiscoveryScanner::new(Arc::new(StaticSource(pages)), classifier.clone())
            .with_batch_delay(Duration::ZERO);

        let report = scanner.scan(now).await.unwrap();
        assert_eq!(*classifier.batches.lock().unwrap(), vec![5, 5, 2]);
        assert_eq!(report.batches, 3);
        assert_eq!(report.pages_scanned, 12);
        assert_eq!(report.ideas.len(), 12);
        assert!(
            report
                .ideas
                .windows(2)
                .all(|w| w[0].dormant_days >= w[1].dormant_days)
        );
        assert_eq!(
            report.oldest().unwrap().dormant_days,
            report.ideas.iter().map(|d| d.dormant_days).max().unwrap()
        );
    }

    #[tokio::test]
    async fn paces_between_batches_only() {
        let now = Utc::now();
        let pages: Vec<_> = (0..11).map(|i| page(&i.to_string(), "", 40, now)).collect();
        let scanner = DiscoveryScanner::new(
            Arc::new(StaticSource(pages)),
            Arc::new(RecordingClassifier::default()),
        )
        .with_batch_delay(Duration::from_millis(40));

        let started = Instant::now();
        scanner.scan(now).await.unwrap();
        let elapsed = started.elapsed();
        // three batches, two pauses
        assert!(elapsed >= Duration::from_millis(80));
        assert!(elapsed < Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn keyword_scan_filters_pages() {
        let now = Utc::now();
        let pages = vec![
            page("old-plan", "project plan for a referral program", 40, now),
            page("new-plan", "project plan for a referral program", 5, now),
            page("notes", "meeting notes, idea list", 80, now),
            page("ancient", "a wild idea about pricing", 200, now),
        ];
        let scanner = DiscoveryScanner::new(
            Arc::new(StaticSource(pages)),
            Arc::new(KeywordClassifier::default()),
        )
        .with_batch_delay(Duration::ZERO);

        let report = scanner.scan(now).await.unwrap();
        let ids: Vec<&str> = report.ideas.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["ancient", "old-plan"]);
        assert_eq!(report.oldest().unwrap().source, "Notion");
    }

    #[tokio::test]
    async fn empty_source_yields_empty_report() {
        let scanner = DiscoveryScanner::new(
            Arc::new(StaticSource(Vec::new())),
            Arc::new(RecordingClassifier::default()),
        );
        let report = scanner.scan(Utc::now()).await.unwrap();
        assert!(report.oldest().is_none());
        assert_eq!(report.batches, 0);
    }

    fn discovered(now: DateTime<Utc>) -> DiscoveredIdea {
        DiscoveredIdea {
            id: "page-1".into(),
            title: "Referral program".into(),
            content: "Give credits for invites".into(),
            summary: "Referral credits".into(),
            source: "Notion".into(),
            source_url: "https://notion.so/page-1".into(),
            last_edited: now - ChronoDuration::days(45),
            dormant_days: 45,
            confidence: 0.7,
        }
    }

    #[tokio::test]
    async fn triage_frozen_creates_dormant_idea() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let idea = triage_discovered(&store, "ws1", &discovered(now), Triage::Frozen, now)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(idea.status, IdeaStatus::Frozen);
        assert!(idea.is_dormant);
        assert_eq!(
            idea.dormancy_reason.as_deref(),
            Some("Dormant for 45 days in Notion")
        );
        assert!(idea.description.contains("Source: https://notion.so/page-1"));

        let stored = store.get_idea(idea.id).await.unwrap().unwrap();
        assert_eq!(stored, idea);
        let activity = store.list_activity("ws1", 10).await.unwrap();
        assert_eq!(activity[0].action, "discovered");
    }

    #[tokio::test]
    async fn triage_active_and_discarded() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let active = triage_discovered(&store, "ws1", &discovered(now), Triage::Active, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.status, IdeaStatus::Active);
        assert!(!active.is_dormant);

        let none = triage_discovered(&store, "ws1", &discovered(now), Triage::Discarded, now)
            .await
            .unwrap();
        assert!(none.is_none());
        assert_eq!(store.list_ideas("ws1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn triage_rejects_blank_title() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut d = discovered(now);
        d.title = "  ".into();
        assert!(
            triage_discovered(&store, "ws1", &d, Triage::Active, now)
                .await
                .is_err()
        );
        assert!(store.list_ideas("ws1").await.unwrap().is_empty());
    }
}

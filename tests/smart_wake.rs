//! End-to-end Smart Wake over a real libSQL store.
//!
//! Ideas are frozen through `IdeaService`, metrics are upserted, and the
//! configured scorer ranks them. The remote scorer is driven by stub LLMs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use icebox::error::LlmError;
use icebox::ideas::{Idea, IdeaService, Metric, Priority, Trigger};
use icebox::llm::{CompletionRequest, CompletionResponse, LlmProvider};
use icebox::store::{LibSqlStore, Store};
use icebox::wake::{SuggestedAction, build_scorer};

/// Returns the same text for every prompt.
struct CannedLlm(String);

#[async_trait]
impl LlmProvider for CannedLlm {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            content: self.0.clone(),
        })
    }
}

struct IdeaIds {
    a: uuid::Uuid,
    b: uuid::Uuid,
}

/// A: 5 votes, High, 40 days old, waiting on MAU (4200/5000).
/// B: 0 votes, Low, 2 days old, no trigger.
async fn seed(svc: &IdeaService, store: &dyn Store, now: DateTime<Utc>) -> IdeaIds {
    store
        .upsert_metric(&Metric::new(svc.workspace_id(), "MAU", 4200.0, 5000.0))
        .await
        .unwrap();

    let a = svc
        .create(
            Idea::new(svc.workspace_id(), "Dark mode")
                .with_votes(5)
                .with_priority(Priority::High)
                .with_created_at(now - Duration::days(40)),
            now,
        )
        .await
        .unwrap();
    svc.freeze(
        a.id,
        Trigger::Metric {
            condition: "MAU".into(),
        },
        "Wait for growth",
        now,
    )
    .await
    .unwrap();

    let b = svc
        .create(
            Idea::new(svc.workspace_id(), "Offline sync")
                .with_priority(Priority::Low)
                .with_created_at(now - Duration::days(2)),
            now,
        )
        .await
        .unwrap();
    svc.freeze(b.id, Trigger::None, "Too early", now).await.unwrap();

    IdeaIds { a: a.id, b: b.id }
}

#[tokio::test]
async fn local_scoring_ranks_the_ready_idea_first() {
    let store: Arc<dyn Store> = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let svc = IdeaService::new(Arc::clone(&store), build_scorer(None), "acme");
    let now = Utc::now();
    let ids = seed(&svc, store.as_ref(), now).await;

    let recs = svc.recommendations(now).await.unwrap();
    assert_eq!(recs.len(), 2);

    assert_eq!(recs[0].idea_id, ids.a);
    assert_eq!(recs[0].score, 100);
    assert_eq!(recs[0].suggested_action, SuggestedAction::Wake);
    assert!(recs[0].reason.contains("Linked to MAU metric"));

    assert_eq!(recs[1].idea_id, ids.b);
    assert_eq!(recs[1].score, 4);

    // deterministic across calls
    assert_eq!(svc.recommendations(now).await.unwrap(), recs);
}

#[tokio::test]
async fn garbage_llm_output_matches_local_result() {
    let store: Arc<dyn Store> = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let now = Utc::now();

    let local = IdeaService::new(Arc::clone(&store), build_scorer(None), "acme");
    seed(&local, store.as_ref(), now).await;
    let expected = local.recommendations(now).await.unwrap();

    let llm: Arc<dyn LlmProvider> = Arc::new(CannedLlm("I'd wake the dark mode one!".into()));
    let remote = IdeaService::new(Arc::clone(&store), build_scorer(Some(llm)), "acme");
    assert_eq!(remote.recommendations(now).await.unwrap(), expected);
}

#[tokio::test]
async fn valid_llm_output_is_used_after_validation() {
    let store: Arc<dyn Store> = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let now = Utc::now();
    let seeder = IdeaService::new(Arc::clone(&store), build_scorer(None), "acme");
    let ids = seed(&seeder, store.as_ref(), now).await;

    let reply = format!(
        r#"[{{"idea_id": "{}", "score": 75, "reason": "Mobile users asked again"}},
            {{"idea_id": "not-a-uuid", "score": 90}}]"#,
        ids.b
    );
    let llm: Arc<dyn LlmProvider> = Arc::new(CannedLlm(reply));
    let svc = IdeaService::new(Arc::clone(&store), build_scorer(Some(llm)), "acme");

    let recs = svc.recommendations(now).await.unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].idea_id, ids.b);
    assert_eq!(recs[0].score, 75);
    assert_eq!(recs[0].suggested_action, SuggestedAction::Wake);
}

#[tokio::test]
async fn top_three_of_many() {
    let store: Arc<dyn Store> = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let svc = IdeaService::new(Arc::clone(&store), build_scorer(None), "acme");
    let now = Utc::now();

    for i in 0..6u32 {
        let idea = svc
            .create(
                Idea::new("acme", format!("Idea {i}"))
                    .with_votes(i)
                    .with_created_at(now - Duration::days(i64::from(i) * 3)),
                now,
            )
            .await
            .unwrap();
        svc.freeze(idea.id, Trigger::None, "later", now).await.unwrap();
    }

    let recs = svc.recommendations(now).await.unwrap();
    assert_eq!(recs.len(), 3);
    assert!(recs.iter().all(|r| r.score <= 100));
    assert!(recs.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn nothing_frozen_means_no_recommendations() {
    let store: Arc<dyn Store> = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let svc = IdeaService::new(Arc::clone(&store), build_scorer(None), "acme");
    svc.create(Idea::new("acme", "Active only"), Utc::now())
        .await
        .unwrap();
    assert!(svc.recommendations(Utc::now()).await.unwrap().is_empty());
}

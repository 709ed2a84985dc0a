//! Integration tests for the Notion client, proxy and discovery scan.
//!
//! A stub Notion API and the real proxy each run on a random port; the
//! client talks to the stub only through the proxy.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{Duration as ChronoDuration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use icebox::discovery::{DiscoveryScanner, KeywordClassifier, PageSource};
use icebox::error::NotionError;
use icebox::notion::{NotionClient, NotionOAuth};
use icebox::proxy::{ProxyState, notion_proxy_routes};

const TOKEN: &str = "secret_test_token";
/// base64("cid:csecret")
const BASIC_AUTH: &str = "Basic Y2lkOmNzZWNyZXQ=";

fn authorized(headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    if headers.get("Notion-Version").and_then(|v| v.to_str().ok()) != Some("2022-06-28") {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"code": "missing_version"})),
        ));
    }
    let expected = format!("Bearer {TOKEN}");
    if headers.get("Authorization").and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"code": "unauthorized"})),
        ));
    }
    Ok(())
}

/// `days_ago` whole days plus an hour, so day counts are stable during the test.
fn page(id: &str, title: &str, days_ago: i64) -> Value {
    let edited = Utc::now() - ChronoDuration::days(days_ago) - ChronoDuration::hours(1);
    json!({
        "object": "page",
        "id": id,
        "url": format!("https://www.notion.so/{id}"),
        "last_edited_time": edited.to_rfc3339(),
        "properties": {"Name": {"type": "title", "title": [{"plain_text": title}]}}
    })
}

async fn stub_search(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if let Err(e) = authorized(&headers) {
        return e.into_response();
    }
    let resp = match body["start_cursor"].as_str() {
        None => json!({
            "results": [page("p1", "Referral program", 40), page("p2", "Weekly sync", 60)],
            "has_more": true,
            "next_cursor": "c2"
        }),
        Some("c2") => json!({
            "results": [page("p3", "Pricing", 5)],
            "has_more": false,
            "next_cursor": null
        }),
        Some(_) => {
            return (StatusCode::BAD_REQUEST, Json(json!({"code": "bad_cursor"}))).into_response();
        }
    };
    Json(resp).into_response()
}

async fn stub_children(
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Err(e) = authorized(&headers) {
        return e.into_response();
    }
    if !query.contains_key("page_size") {
        let body = Json(json!({"code": "missing_page_size"}));
        return (StatusCode::BAD_REQUEST, body).into_response();
    }
    let text = match id.as_str() {
        "p1" => "Project plan for a referral program",
        "p2" => "Meeting notes: idea backlog review",
        _ => "Idea: a cheaper pricing tier",
    };
    Json(json!({
        "results": [
            {"type": "paragraph", "paragraph": {"rich_text": [{"plain_text": text}]}}
        ],
        "has_more": false
    }))
    .into_response()
}

async fn stub_oauth(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if headers.get("Authorization").and_then(|v| v.to_str().ok()) != Some(BASIC_AUTH) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_client"}))).into_response();
    }
    if body["grant_type"] != "authorization_code" || body["code"] != "auth-code" {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"}))).into_response();
    }
    Json(json!({
        "access_token": "ntn_issued",
        "workspace_id": "ws-1",
        "workspace_name": "Acme",
        "bot_id": "bot-1"
    }))
    .into_response()
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("http://127.0.0.1:{port}")
}

/// Start the stub Notion API and a proxy in front of it. Returns the proxy URL.
async fn start_stack() -> String {
    let notion = Router::new()
        .route("/v1/search", post(stub_search))
        .route("/v1/blocks/{id}/children", get(stub_children))
        .route("/v1/oauth/token", post(stub_oauth));
    let upstream = serve(notion).await;

    let oauth = NotionOAuth {
        client_id: "cid".into(),
        client_secret: SecretString::from("csecret"),
    };
    serve(notion_proxy_routes(ProxyState::new(upstream, Some(oauth)))).await
}

#[tokio::test]
async fn client_reads_pages_through_proxy() {
    let proxy = start_stack().await;
    let client = NotionClient::via_proxy(&proxy).with_token(SecretString::from(TOKEN));

    let pages = client.fetch_pages().await.unwrap();
    let ids: Vec<&str> = pages.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
    assert_eq!(pages[0].title, "Referral program");
    assert_eq!(pages[0].content, "Project plan for a referral program");
    assert_eq!(pages[0].url, "https://www.notion.so/p1");
}

#[tokio::test]
async fn max_pages_counts_documents_across_result_pages() {
    let proxy = start_stack().await;
    let capped = |n| {
        NotionClient::via_proxy(&proxy)
            .with_token(SecretString::from(TOKEN))
            .with_max_pages(n)
    };

    let ids = |pages: Vec<icebox::notion::PageSummary>| -> Vec<String> {
        pages.into_iter().map(|p| p.id).collect()
    };
    assert_eq!(ids(capped(1).search_pages().await.unwrap()), vec!["p1"]);
    assert_eq!(ids(capped(2).search_pages().await.unwrap()), vec!["p1", "p2"]);
    assert_eq!(
        ids(capped(3).search_pages().await.unwrap()),
        vec!["p1", "p2", "p3"]
    );
}

#[tokio::test]
async fn keyword_discovery_over_proxy() {
    let proxy = start_stack().await;
    let client = NotionClient::via_proxy(&proxy).with_token(SecretString::from(TOKEN));
    let scanner = DiscoveryScanner::new(Arc::new(client), Arc::new(KeywordClassifier::default()))
        .with_batch_delay(Duration::ZERO);

    let report = scanner.scan(Utc::now()).await.unwrap();
    assert_eq!(report.pages_scanned, 3);
    assert_eq!(report.ideas.len(), 1);
    let oldest = report.oldest().unwrap();
    assert_eq!(oldest.id, "p1");
    assert_eq!(oldest.source, "Notion");
    assert_eq!(oldest.dormant_days, 40);
    assert!((oldest.confidence - 0.7).abs() < f32::EPSILON);
}

#[tokio::test]
async fn upstream_errors_are_relayed() {
    let proxy = start_stack().await;
    let client = NotionClient::via_proxy(&proxy).with_token(SecretString::from("wrong"));
    match client.search_pages().await {
        Err(NotionError::HttpStatus { status, body }) => {
            assert_eq!(status, 401);
            assert!(body.contains("unauthorized"));
        }
        other => panic!("expected 401, got {other:?}"),
    }
}

#[tokio::test]
async fn oauth_exchange_uses_server_credentials() {
    let proxy = start_stack().await;
    let client = NotionClient::via_proxy(&proxy);
    let token = client
        .exchange_oauth_code(None, "auth-code", "http://localhost:3000/callback")
        .await
        .unwrap();
    assert_eq!(token.access_token.expose_secret(), "ntn_issued");
    assert_eq!(token.workspace_name.as_deref(), Some("Acme"));
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("http://{}", closed.local_addr().unwrap());
    drop(closed);

    let proxy = serve(notion_proxy_routes(ProxyState::new(dead, None))).await;
    let resp = reqwest::Client::new()
        .post(format!("{proxy}/api/notion/search"))
        .header("Authorization", format!("Bearer {TOKEN}"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 502);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Upstream"));
}

#[tokio::test]
async fn health_endpoint() {
    let proxy = serve(notion_proxy_routes(ProxyState::default())).await;
    let body: Value = reqwest::get(format!("{proxy}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

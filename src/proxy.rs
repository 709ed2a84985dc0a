//! Same-origin proxy for the Notion REST API.
//!
//! Browsers cannot call `api.notion.com` directly, so the web client goes
//! through these routes. Method, body, query string and `Authorization`
//! are forwarded untouched; status and body are relayed back.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use secrecy::ExposeSecret;
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use crate::notion::{DEFAULT_BASE_URL, NOTION_VERSION, NotionOAuth};

/// Shared state for proxy handlers.
#[derive(Clone)]
pub struct ProxyState {
    client: reqwest::Client,
    upstream: String,
    oauth: Option<NotionOAuth>,
}

impl ProxyState {
    pub fn new(upstream: impl Into<String>, oauth: Option<NotionOAuth>) -> Self {
        Self {
            client: reqwest::Client::new(),
            upstream: upstream.into().trim_end_matches('/').to_string(),
            oauth,
        }
    }
}

impl Default for ProxyState {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, None)
    }
}

/// Build the proxy router.
pub fn notion_proxy_routes(state: ProxyState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/notion/oauth/token", post(oauth_token))
        .route("/api/notion/search", post(search))
        .route("/api/notion/blocks/{id}/children", get(block_children))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "icebox-notion-proxy"
    }))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Send the prepared upstream request and relay the answer.
async fn relay(request: reqwest::RequestBuilder, headers: &HeaderMap) -> Response {
    let version = headers
        .get("Notion-Version")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(NOTION_VERSION)
        .to_string();

    let upstream = match request.header("Notion-Version", version).send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(error = %e, "Notion upstream unreachable");
            return error_response(StatusCode::BAD_GATEWAY, format!("Upstream request failed: {e}"));
        }
    };

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| HeaderValue::from_bytes(v.as_bytes()).ok())
        .unwrap_or(HeaderValue::from_static("application/json"));

    match upstream.bytes().await {
        Ok(body) => {
            debug!(status = status.as_u16(), bytes = body.len(), "Relayed Notion response");
            (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to read Notion upstream body");
            error_response(StatusCode::BAD_GATEWAY, format!("Upstream body unreadable: {e}"))
        }
    }
}

fn with_authorization(
    request: reqwest::RequestBuilder,
    headers: &HeaderMap,
) -> reqwest::RequestBuilder {
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(auth) => request.header("Authorization", auth),
        None => request,
    }
}

fn json_body(request: reqwest::RequestBuilder, body: Bytes) -> reqwest::RequestBuilder {
    request
        .header("Content-Type", "application/json")
        .body(if body.is_empty() { Bytes::from_static(b"{}") } else { body })
}

async fn oauth_token(State(state): State<ProxyState>, headers: HeaderMap, body: Bytes) -> Response {
    let url = format!("{}/v1/oauth/token", state.upstream);
    let mut request = json_body(state.client.post(url), body);

    if headers.contains_key(header::AUTHORIZATION) {
        request = with_authorization(request, &headers);
    } else if let Some(oauth) = &state.oauth {
        request = request.basic_auth(&oauth.client_id, Some(oauth.client_secret.expose_secret()));
    } else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Notion OAuth is not configured",
        );
    }
    relay(request, &headers).await
}

async fn search(State(state): State<ProxyState>, headers: HeaderMap, body: Bytes) -> Response {
    let url = format!("{}/v1/search", state.upstream);
    let request = with_authorization(json_body(state.client.post(url), body), &headers);
    relay(request, &headers).await
}

async fn block_children(
    State(state): State<ProxyState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let mut url = format!("{}/v1/blocks/{id}/children", state.upstream);
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(&q);
    }
    let request = with_authorization(state.client.get(url), &headers);
    relay(request, &headers).await
}

//! Notion REST client.
//!
//! Talks either to `api.notion.com` directly (`/v1/...`) or to the bundled
//! proxy (`/api/notion/...`). Pages are flattened to plain text so the
//! discovery classifiers only ever see strings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::discovery::{PageCandidate, PageSource};
use crate::error::NotionError;

/// Notion API version sent on every request.
pub const NOTION_VERSION: &str = "2022-06-28";

pub const DEFAULT_BASE_URL: &str = "https://api.notion.com";

/// Path prefix when talking to Notion itself.
const DIRECT_PREFIX: &str = "/v1";
/// Path prefix when talking through the proxy.
const PROXY_PREFIX: &str = "/api/notion";

const PAGE_SIZE: u32 = 100;
const DEFAULT_MAX_PAGES: usize = 50;

/// OAuth client credentials for the public integration.
#[derive(Debug, Clone)]
pub struct NotionOAuth {
    pub client_id: String,
    pub client_secret: SecretString,
}

/// Result of an OAuth code exchange.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthToken {
    #[serde(skip)]
    pub access_token: SecretString,
    pub workspace_id: Option<String>,
    pub workspace_name: Option<String>,
    pub bot_id: Option<String>,
}

/// Page metadata from `/search`, before its blocks are fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSummary {
    pub id: String,
    pub title: String,
    pub url: String,
    pub last_edited: DateTime<Utc>,
}

/// Notion API client.
pub struct NotionClient {
    client: reqwest::Client,
    base_url: String,
    prefix: &'static str,
    token: Option<SecretString>,
    max_pages: usize,
}

impl NotionClient {
    /// Client for the real Notion API (or anything serving `/v1/...`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            prefix: DIRECT_PREFIX,
            token: None,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Client that routes through the same-origin proxy.
    pub fn via_proxy(proxy_url: impl Into<String>) -> Self {
        Self {
            prefix: PROXY_PREFIX,
            ..Self::new(proxy_url)
        }
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    /// Upper bound on Notion pages (documents) returned by one search,
    /// counted across all result pages.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.prefix, path)
    }

    fn bearer(&self) -> Result<String, NotionError> {
        self.token
            .as_ref()
            .map(|t| format!("Bearer {}", t.expose_secret()))
            .ok_or(NotionError::MissingToken)
    }

    async fn send_json(&self, request: reqwest::RequestBuilder) -> Result<Value, NotionError> {
        let resp = request
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await
            .map_err(|e| NotionError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotionError::HttpStatus {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }
        resp.json::<Value>()
            .await
            .map_err(|e| NotionError::InvalidResponse(e.to_string()))
    }

    /// All pages shared with the integration, stopping once `max_pages`
    /// documents have been collected.
    pub async fn search_pages(&self) -> Result<Vec<PageSummary>, NotionError> {
        let auth = self.bearer()?;
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({
                "filter": {"property": "object", "value": "page"},
                "page_size": (PAGE_SIZE as usize).min(self.max_pages - pages.len()),
            });
            if let Some(c) = &cursor {
                body["start_cursor"] = json!(c);
            }

            let resp = self
                .send_json(
                    self.client
                        .post(self.url("/search"))
                        .header("Authorization", &auth)
                        .json(&body),
                )
                .await?;

            for raw in results(&resp)? {
                match parse_page(raw) {
                    Some(page) => pages.push(page),
                    None => debug!("Skipping search result without id or edit time"),
                }
                if pages.len() >= self.max_pages {
                    return Ok(pages);
                }
            }

            cursor = next_cursor(&resp);
            if cursor.is_none() {
                return Ok(pages);
            }
        }
    }

    /// Plain text of a page's top-level blocks, one line per block.
    pub async fn page_text(&self, block_id: &str) -> Result<String, NotionError> {
        let auth = self.bearer()?;
        let mut lines = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("page_size", PAGE_SIZE.to_string())];
            if let Some(c) = &cursor {
                query.push(("start_cursor", c.clone()));
            }
            let resp = self
                .send_json(
                    self.client
                        .get(self.url(&format!("/blocks/{block_id}/children")))
                        .header("Authorization", &auth)
                        .query(&query),
                )
                .await?;

            lines.extend(results(&resp)?.iter().filter_map(block_text));

            cursor = next_cursor(&resp);
            if cursor.is_none() {
                return Ok(lines.join("\n"));
            }
        }
    }

    /// Exchange an OAuth authorization code for an access token.
    ///
    /// Through the proxy, `oauth` may be `None`: the proxy adds the client
    /// credentials itself.
    pub async fn exchange_oauth_code(
        &self,
        oauth: Option<&NotionOAuth>,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthToken, NotionError> {
        let mut request = self.client.post(self.url("/oauth/token")).json(&json!({
            "grant_type": "authorization_code",
            "code": code,
            "redirect_uri": redirect_uri,
        }));
        if let Some(oauth) = oauth {
            request = request.basic_auth(
                &oauth.client_id,
                Some(oauth.client_secret.expose_secret()),
            );
        } else if self.prefix == DIRECT_PREFIX {
            return Err(NotionError::OAuthNotConfigured);
        }

        let resp = self.send_json(request).await?;
        let access_token = resp["access_token"]
            .as_str()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| NotionError::InvalidResponse("missing access_token".into()))?;
        let text = |key: &str| resp[key].as_str().map(str::to_string);

        info!(workspace = ?text("workspace_name"), "Notion OAuth code exchanged");
        Ok(OAuthToken {
            access_token: SecretString::from(access_token.to_string()),
            workspace_id: text("workspace_id"),
            workspace_name: text("workspace_name"),
            bot_id: text("bot_id"),
        })
    }
}

fn results(resp: &Value) -> Result<&Vec<Value>, NotionError> {
    resp["results"]
        .as_array()
        .ok_or_else(|| NotionError::InvalidResponse("missing results array".into()))
}

fn next_cursor(resp: &Value) -> Option<String> {
    if resp["has_more"].as_bool() != Some(true) {
        return None;
    }
    resp["next_cursor"].as_str().map(str::to_string)
}

/// Concatenate the `plain_text` of a rich-text array.
fn plain_text(rich_text: &Value) -> String {
    rich_text
        .as_array()
        .map(|spans| {
            spans
                .iter()
                .filter_map(|s| s["plain_text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Title of a page: the property whose type is `title`.
fn page_title(page: &Value) -> String {
    let title = page["properties"]
        .as_object()
        .and_then(|props| props.values().find(|p| p["type"] == "title"))
        .map(|p| plain_text(&p["title"]))
        .unwrap_or_default();
    if title.trim().is_empty() {
        "Untitled".to_string()
    } else {
        title.trim().to_string()
    }
}

fn parse_page(raw: &Value) -> Option<PageSummary> {
    let id = raw["id"].as_str()?.to_string();
    let last_edited = raw["last_edited_time"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())?
        .with_timezone(&Utc);
    Some(PageSummary {
        title: page_title(raw),
        url: raw["url"].as_str().unwrap_or_default().to_string(),
        id,
        last_edited,
    })
}

/// Text of one block, if it carries any.
fn block_text(block: &Value) -> Option<String> {
    let kind = block["type"].as_str()?;
    let body = &block[kind];
    let text = match kind {
        "child_page" => body["title"].as_str().unwrap_or_default().to_string(),
        "to_do" => {
            let mark = if body["checked"].as_bool() == Some(true) { "[x]" } else { "[ ]" };
            format!("{mark} {}", plain_text(&body["rich_text"]))
        }
        _ => plain_text(&body["rich_text"]),
    };
    let text = text.trim();
    (!text.is_empty() && text != "[ ]" && text != "[x]").then(|| text.to_string())
}

#[async_trait]
impl PageSource for NotionClient {
    fn name(&self) -> &str {
        "Notion"
    }

    async fn fetch_pages(&self) -> Result<Vec<PageCandidate>, NotionError> {
        let summaries = self.search_pages().await?;
        info!(pages = summaries.len(), "Fetched Notion pages");

        let mut pages = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let content = match self.page_text(&summary.id).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(page = %summary.id, error = %e, "Failed to read page blocks");
                    String::new()
                }
            };
            pages.push(PageCandidate {
                id: summary.id,
                title: summary.title,
                content,
                url: summary.url,
                last_edited: summary.last_edited,
            });
        }
        Ok(pages)
    }
}

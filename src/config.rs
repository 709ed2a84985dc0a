//! Configuration types, read from the environment once at startup.
//!
//! Strategy selection happens here: an LLM key enables the remote scorer
//! and classifier, a database path enables the libSQL store. Without one the
//! demo store keeps its data in `~/.icebox/demo.json`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::discovery::keywords::DEFAULT_DORMANCY_DAYS;
use crate::error::ConfigError;
use crate::llm::LlmConfig;
use crate::notion::{DEFAULT_BASE_URL as NOTION_DEFAULT_BASE_URL, NotionOAuth};

pub const DEFAULT_WORKSPACE: &str = "default";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_PROXY_PORT: u16 = 8787;
pub const DEFAULT_BATCH_DELAY_MS: u64 = 200;
pub const DEFAULT_NOTION_MAX_PAGES: usize = 50;

/// Which store backs the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// Persistent libSQL database file.
    LibSql { path: PathBuf },
    /// Demo mode: in-memory tables mirrored to a JSON snapshot file.
    Local { path: PathBuf },
}

/// Notion access for discovery and the proxy.
#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub base_url: String,
    pub token: Option<SecretString>,
    pub oauth: Option<NotionOAuth>,
    pub max_pages: usize,
}

/// Discovery scan tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Pages untouched for more than this many days count as dormant.
    pub dormancy_days: i64,
    pub batch_delay: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            dormancy_days: DEFAULT_DORMANCY_DAYS,
            batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
        }
    }
}

/// Everything the binary needs.
#[derive(Debug, Clone)]
pub struct IceboxConfig {
    pub workspace_id: String,
    pub store: StoreConfig,
    /// `None` selects the local heuristics.
    pub llm: Option<LlmConfig>,
    pub notion: NotionConfig,
    pub discovery: DiscoveryConfig,
    pub proxy_port: u16,
}

impl IceboxConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let store = match get("ICEBOX_DB_PATH") {
            Some(path) => StoreConfig::LibSql {
                path: PathBuf::from(path),
            },
            None => StoreConfig::Local {
                path: get("ICEBOX_DEMO_PATH").map(PathBuf::from).unwrap_or_else(|| {
                    PathBuf::from(get("HOME").unwrap_or_else(|| ".".to_string()))
                        .join(".icebox")
                        .join("demo.json")
                }),
            },
        };

        let llm = get("GEMINI_API_KEY").map(|key| LlmConfig {
            api_key: SecretString::from(key),
            model: get("ICEBOX_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: get("ICEBOX_LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
        });

        let oauth = match (get("NOTION_CLIENT_ID"), get("NOTION_CLIENT_SECRET")) {
            (Some(client_id), Some(secret)) => Some(NotionOAuth {
                client_id,
                client_secret: SecretString::from(secret),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar("NOTION_CLIENT_SECRET".into()));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingEnvVar("NOTION_CLIENT_ID".into()));
            }
        };

        let notion = NotionConfig {
            base_url: get("NOTION_BASE_URL")
                .unwrap_or_else(|| NOTION_DEFAULT_BASE_URL.to_string()),
            token: get("NOTION_TOKEN").map(SecretString::from),
            oauth,
            max_pages: parse_or(
                "ICEBOX_NOTION_MAX_PAGES",
                get("ICEBOX_NOTION_MAX_PAGES"),
                DEFAULT_NOTION_MAX_PAGES,
            )?,
        };

        let dormancy_days: i64 = parse_or(
            "ICEBOX_DORMANCY_DAYS",
            get("ICEBOX_DORMANCY_DAYS"),
            DEFAULT_DORMANCY_DAYS,
        )?;
        if dormancy_days < 0 {
            return Err(ConfigError::InvalidValue {
                key: "ICEBOX_DORMANCY_DAYS".into(),
                message: "must not be negative".into(),
            });
        }
        let batch_delay_ms: u64 = parse_or(
            "ICEBOX_BATCH_DELAY_MS",
            get("ICEBOX_BATCH_DELAY_MS"),
            DEFAULT_BATCH_DELAY_MS,
        )?;

        Ok(Self {
            workspace_id: get("ICEBOX_WORKSPACE").unwrap_or_else(|| DEFAULT_WORKSPACE.to_string()),
            store,
            llm,
            notion,
            discovery: DiscoveryConfig {
                dormancy_days,
                batch_delay: Duration::from_millis(batch_delay_ms),
            },
            proxy_port: parse_or(
                "ICEBOX_PROXY_PORT",
                get("ICEBOX_PROXY_PORT"),
                DEFAULT_PROXY_PORT,
            )?,
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
    }
}

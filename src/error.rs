//! Error types for the icebox core.

use uuid::Uuid;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Notion error: {0}")]
    Notion(#[from] NotionError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transaction aborted: {0}")]
    Transaction(String),
}

impl DatabaseError {
    pub fn idea_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "idea".to_string(),
            id: id.to_string(),
        }
    }
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} returned HTTP {status}: {body}")]
    HttpStatus {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} returned no text")]
    EmptyResponse { provider: String },
}

/// Failures while turning untrusted model output into typed data.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("No JSON {expected} found in model output")]
    NoJson { expected: &'static str },

    #[error("Malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Schema mismatch: {0}")]
    Schema(String),

    #[error("Model output referenced no known ids")]
    NoKnownIds,
}

/// Notion API and proxy errors.
#[derive(Debug, thiserror::Error)]
pub enum NotionError {
    #[error("Notion request failed: {0}")]
    Request(String),

    #[error("Notion returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Unexpected Notion response: {0}")]
    InvalidResponse(String),

    #[error("Notion OAuth is not configured")]
    OAuthNotConfigured,

    #[error("No Notion access token configured")]
    MissingToken,
}

/// Input and state-transition validation errors, raised before any write.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Required field {field} is empty")]
    EmptyField { field: &'static str },

    #[error("Idea {id} is {current}, cannot {action}")]
    InvalidTransition {
        id: Uuid,
        current: String,
        action: &'static str,
    },

    #[error("Idea {id} does not belong to workspace {workspace_id}")]
    WrongWorkspace { id: Uuid, workspace_id: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

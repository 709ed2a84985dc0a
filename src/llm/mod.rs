//! LLM integration for the icebox.
//!
//! A single backend is supported today:
//! - **Gemini**: `generateContent` via rig-core
//!
//! rig handles HTTP transport; [`RigAdapter`] bridges its `CompletionModel`
//! to our `LlmProvider` trait. Callers depend on the trait so tests can
//! inject stubs and the remote strategies stay optional.

pub mod json;
pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;
use tracing::info;

use crate::error::LlmError;

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub base_url: String,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::gemini;

    let client = gemini::Client::builder()
        .api_key(config.api_key.expose_secret())
        .base_url(config.base_url.trim_end_matches('/'))
        .build()
        .map_err(|e| LlmError::RequestFailed {
            provider: "gemini".to_string(),
            reason: format!("Failed to create Gemini client: {e}"),
        })?;

    let model = client.completion_model(&config.model);
    info!("Using Gemini (model: {})", config.model);
    Ok(Arc::new(RigAdapter::new(model, &config.model, "gemini")))
}

//! Provider selection from environment configuration

use super::anthropic::{AnthropicModel, AnthropicService};
use super::{LlmService, LoggingService};
use std::sync::Arc;

/// Configuration for the generative backend
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    /// Gateway URL; when set the gateway handles authentication
    pub gateway: Option<String>,
    pub default_model: Option<String>,
}

impl LlmConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            anthropic_api_key: non_empty("ANTHROPIC_API_KEY"),
            gateway: non_empty("LLM_GATEWAY"),
            default_model: non_empty("DEFAULT_MODEL"),
        }
    }
}

/// Build the configured backend, wrapped with logging.
///
/// Returns `None` when no credentials are available; the caller then runs
/// without a generative backend.
pub fn build_service(config: &LlmConfig) -> Option<Arc<dyn LlmService>> {
    let api_key = if config.gateway.is_some() {
        "implicit".to_string()
    } else {
        config.anthropic_api_key.clone().filter(|k| !k.is_empty())?
    };

    let model = match config.default_model.as_deref() {
        Some(id) => AnthropicModel::from_model_id(id).or_else(|| {
            tracing::warn!(model = %id, "Unknown model id, using default");
            None
        }),
        None => None,
    }
    .unwrap_or(AnthropicModel::Haiku);

    match AnthropicService::new(api_key, model, config.gateway.as_deref()) {
        Ok(service) => Some(Arc::new(LoggingService::new(Arc::new(service)))),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create generative backend");
            None
        }
    }
}

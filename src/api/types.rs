//! API request and response types

use serde::{Deserialize, Serialize};

/// Request for the opening message
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GreetingRequest {
    /// Generated when absent
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Liveness and engine mode
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub diagnostic_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

//! Inbound event and outbound response contracts
//!
//! These are the only shapes exchanged with the web layer.

use crate::normalizer::MAX_TEXT_CHARS;
use crate::state_machine::Stage;
use serde::{Deserialize, Serialize};

/// Tokens and image references are recorded up to this length
const MAX_REFERENCE_CHARS: usize = 256;

fn capped(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// One user submission for a conversation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub conversation_id: String,
    pub request_id: String,
    #[serde(default)]
    pub user_text: Option<String>,
    #[serde(default)]
    pub button_token: Option<String>,
    #[serde(default)]
    pub image_reference: Option<String>,
}

impl InboundEvent {
    pub fn text(
        conversation_id: impl Into<String>,
        request_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            request_id: request_id.into(),
            user_text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn button(
        conversation_id: impl Into<String>,
        request_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            request_id: request_id.into(),
            button_token: Some(token.into()),
            ..Default::default()
        }
    }

    pub fn image(
        conversation_id: impl Into<String>,
        request_id: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            request_id: request_id.into(),
            image_reference: Some(reference.into()),
            ..Default::default()
        }
    }

    /// Raw input as recorded in the transcript and audit log.
    ///
    /// Text is cut at the same length the normalizer accepts, so the stored
    /// transcript grows by a bounded amount per turn.
    pub fn raw_input(&self) -> String {
        if let Some(token) = &self.button_token {
            return format!("[button] {}", capped(token, MAX_REFERENCE_CHARS));
        }
        let text = self
            .user_text
            .as_deref()
            .map(|t| capped(t, MAX_TEXT_CHARS));
        let image = self
            .image_reference
            .as_deref()
            .map(|r| capped(r, MAX_REFERENCE_CHARS));
        match (text, image) {
            (Some(text), Some(image)) => format!("{text} [image] {image}"),
            (Some(text), None) => text,
            (None, Some(image)) => format!("[image] {image}"),
            (None, None) => String::new(),
        }
    }
}

/// A pre-defined user choice shown alongside a reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub token: String,
    pub label: String,
}

impl Button {
    pub fn new(token: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            label: label.into(),
        }
    }
}

/// Response returned for every processed (or replayed) event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub conversation_id: String,
    pub reply_text: String,
    pub stage: Stage,
    pub buttons: Vec<Button>,
    pub escalation_eligible: bool,
    pub conversation_ended: bool,
    /// False when the session could not be written after one retry
    pub persisted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
}

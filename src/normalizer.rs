//! Input normalization
//!
//! Turns one inbound event into a single canonical input. Button tokens take
//! precedence over text; an image reference is carried with its finding.

mod catalog;
pub mod cues;

pub use catalog::*;

use crate::contract::InboundEvent;
use crate::session::{ImageFinding, Locale, NeedKind, Rating};

/// Free text longer than this is cut before any handler sees it
pub const MAX_TEXT_CHARS: usize = 1000;

/// Structured user intent behind a button (or an equivalent typed word)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Language(Locale),
    SkipName,
    Need(NeedKind),
    AskQuestion,
    StepWorked,
    StillBroken,
    /// Explain a step; `None` means the current one
    ExplainStep(Option<usize>),
    GoBack,
    Escalate,
    Yes,
    No,
    SkipContact,
    Feedback(Rating),
    Resume,
    Restart,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedInput {
    Text(String),
    Action(Action),
    Image {
        finding: Option<ImageFinding>,
        caption: Option<String>,
    },
    /// Unknown button token; kept for logging, never shown to the user
    Unrecognized { token: String },
    Empty,
}

impl NormalizedInput {
    pub fn action(&self) -> Option<Action> {
        match self {
            NormalizedInput::Action(action) => Some(*action),
            _ => None,
        }
    }
}

pub fn normalize(event: &InboundEvent, finding: Option<ImageFinding>) -> NormalizedInput {
    if let Some(token) = event.button_token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return match resolve(token) {
            Some(CatalogEntry::Action(action)) => NormalizedInput::Action(action),
            Some(CatalogEntry::Phrase(phrase)) => NormalizedInput::Text(phrase.to_string()),
            None => {
                tracing::warn!(conv_id = %event.conversation_id, token = %token, "Unrecognized button token");
                NormalizedInput::Unrecognized {
                    token: token.to_string(),
                }
            }
        };
    }

    let text = event.user_text.as_deref().map(clean_text).filter(|t| !t.is_empty());

    if event.image_reference.as_deref().is_some_and(|r| !r.trim().is_empty()) {
        return NormalizedInput::Image {
            finding,
            caption: text,
        };
    }

    match text {
        Some(text) => NormalizedInput::Text(text),
        None => NormalizedInput::Empty,
    }
}

/// Trim, drop control characters and cap the length
fn clean_text(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .take(MAX_TEXT_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string()
}

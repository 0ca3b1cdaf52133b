//! Session state
//!
//! A session is everything the core remembers about one conversation. The
//! store owns the persisted copy; the orchestrator works on a transient copy
//! per request and hands it back before returning.

mod diagnostic;
mod transcript;

pub use diagnostic::{
    is_duplicate_step, DiagnosticMemory, DuplicateStep, StepDescriptor, StepOutcome, StepSource,
    StepTier, MAX_ADVANCED_STEPS, MAX_BASIC_STEPS, MAX_STEPS,
};
pub use transcript::{Actor, Turn};

use crate::contract::ChatResponse;
use crate::diagnostics::Intent;
use crate::state_machine::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Upper bound on remembered request ids per session
pub const MAX_PROCESSED_REQUESTS: usize = 32;

/// Conversation language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    EsAr,
    EsEs,
    En,
}

impl Locale {
    pub fn is_spanish(self) -> bool {
        matches!(self, Locale::EsAr | Locale::EsEs)
    }

    pub fn code(self) -> &'static str {
        match self {
            Locale::EsAr => "es-AR",
            Locale::EsEs => "es-ES",
            Locale::En => "en",
        }
    }
}

/// How comfortable the user is with technical language.
///
/// Only affects phrasing of instructions, never which ones are offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Desktop,
    Notebook,
    Phone,
    Tablet,
    TvStreaming,
    Router,
    Printer,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingSystem {
    Windows,
    MacOs,
    Linux,
    Android,
    Ios,
    ChromeOs,
}

/// What the user came for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedKind {
    /// Something is broken
    Problem,
    /// Guidance to accomplish a task (install, configure)
    Task,
}

/// Out-of-band result of the image analysis collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ImageFinding {
    pub reference: String,
    #[serde(default)]
    pub device_hint: Option<String>,
    #[serde(default)]
    pub error_text: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Good,
    Bad,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: Option<Rating>,
    pub comment: Option<String>,
}

/// Context accumulated while talking to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionContext {
    pub locale: Locale,
    pub display_name: Option<String>,
    pub skill_level: SkillLevel,
    pub need: Option<NeedKind>,
    pub problem: Option<String>,
    pub intent: Option<Intent>,
    pub device: Option<DeviceKind>,
    /// Free-text device model, e.g. "HP Pavilion"
    pub device_detail: Option<String>,
    pub os: Option<OperatingSystem>,
    #[serde(default)]
    pub image_findings: Vec<ImageFinding>,
    /// Contact left for the human hand-off; never copied into a ticket
    pub contact: Option<String>,
}

/// A request id with the response that was returned for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRequest {
    pub request_id: String,
    pub response: ChatResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    stage: Stage,
    /// Stage to resume after an auxiliary branch (at most one)
    #[serde(default)]
    return_stage: Option<Stage>,
    pub context: SessionContext,
    pub diagnostics: DiagnosticMemory,
    pub escalation_eligible: bool,
    #[serde(default)]
    transcript: Vec<Turn>,
    #[serde(default)]
    processed: VecDeque<ProcessedRequest>,
    #[serde(default)]
    pub ticket_id: Option<String>,
    #[serde(default)]
    pub feedback: Option<Feedback>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(skip)]
    dirty: bool,
}

impl Session {
    pub fn new(id: impl Into<String>, initial_stage: Stage) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            stage: initial_stage,
            return_stage: None,
            context: SessionContext::default(),
            diagnostics: DiagnosticMemory::default(),
            escalation_eligible: false,
            transcript: Vec::new(),
            processed: VecDeque::new(),
            ticket_id: None,
            feedback: None,
            created_at: now,
            last_activity: now,
            dirty: true,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn return_stage(&self) -> Option<Stage> {
        self.return_stage
    }

    /// Only the stage machine moves a session between stages
    pub(crate) fn apply_transition(&mut self, stage: Stage, return_stage: Option<Stage>) {
        self.stage = stage;
        self.return_stage = return_stage;
        self.dirty = true;
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Append one turn; turns are never edited or removed
    pub fn append_turn(&mut self, turn: Turn) {
        self.last_activity = turn.timestamp;
        self.transcript.push(turn);
        self.dirty = true;
    }

    pub fn cached_response(&self, request_id: &str) -> Option<&ChatResponse> {
        self.processed
            .iter()
            .find(|p| p.request_id == request_id)
            .map(|p| &p.response)
    }

    /// Remember the response for `request_id`, evicting the oldest entry
    /// once the cap is reached
    pub fn remember_response(&mut self, request_id: &str, response: ChatResponse) {
        if request_id.is_empty() || self.cached_response(request_id).is_some() {
            return;
        }
        while self.processed.len() >= MAX_PROCESSED_REQUESTS {
            self.processed.pop_front();
        }
        self.processed.push_back(ProcessedRequest {
            request_id: request_id.to_string(),
            response,
        });
        self.dirty = true;
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Clear per-problem state for a fresh run through the flow.
    ///
    /// Transcript, processed requests, locale and any ticket survive: a
    /// conversation gets at most one ticket no matter how often it restarts.
    /// The name is cleared because the flow asks for it again.
    pub fn reset_for_restart(&mut self) {
        let locale = self.context.locale;
        self.context = SessionContext {
            locale,
            ..SessionContext::default()
        };
        self.diagnostics = DiagnosticMemory::default();
        self.escalation_eligible = false;
        self.feedback = None;
        self.return_stage = None;
        self.dirty = true;
    }

    /// First name for greetings, if the user gave one
    pub fn first_name(&self) -> Option<&str> {
        self.context
            .display_name
            .as_deref()
            .and_then(|n| n.split_whitespace().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(text: &str) -> ChatResponse {
        ChatResponse {
            conversation_id: "c".to_string(),
            reply_text: text.to_string(),
            stage: Stage::LanguageSelect,
            buttons: vec![],
            escalation_eligible: false,
            conversation_ended: false,
            persisted: true,
            ticket_id: None,
        }
    }

    #[test]
    fn test_processed_requests_are_capped() {
        let mut session = Session::new("c", Stage::LanguageSelect);
        for i in 0..(MAX_PROCESSED_REQUESTS + 5) {
            session.remember_response(&format!("req-{i}"), response(&i.to_string()));
        }
        assert_eq!(session.processed_count(), MAX_PROCESSED_REQUESTS);
        assert!(session.cached_response("req-0").is_none());
        assert!(session.cached_response("req-4").is_none());
        assert_eq!(
            session.cached_response("req-5").unwrap().reply_text,
            "5".to_string()
        );
    }

    #[test]
    fn test_remember_keeps_first_response() {
        let mut session = Session::new("c", Stage::LanguageSelect);
        session.remember_response("r1", response("first"));
        session.remember_response("r1", response("second"));
        assert_eq!(session.cached_response("r1").unwrap().reply_text, "first");
    }

    #[test]
    fn test_reset_keeps_transcript_and_ticket() {
        let mut session = Session::new("c", Stage::LanguageSelect);
        session.context.locale = Locale::En;
        session.context.display_name = Some("Ana".to_string());
        session.context.problem = Some("no internet".to_string());
        session.ticket_id = Some("TCK-1".to_string());
        session.append_turn(Turn::system(Stage::LanguageSelect, "hello", vec![]));

        session.reset_for_restart();

        assert_eq!(session.context.locale, Locale::En);
        assert!(session.context.display_name.is_none());
        assert!(session.context.problem.is_none());
        assert_eq!(session.ticket_id.as_deref(), Some("TCK-1"));
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn test_dirty_flag_not_persisted() {
        let session = Session::new("c", Stage::LanguageSelect);
        assert!(session.is_dirty());
        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();
        assert!(!restored.is_dirty());
        assert_eq!(restored.stage(), Stage::LanguageSelect);
    }
}

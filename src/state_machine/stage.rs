//! Conversation stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named point in the conversation's finite state machine.
///
/// The set is closed: persisted sessions deserialize only into these
/// variants, so an unknown stage string is a decode failure and never a
/// silently-accepted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    LanguageSelect,
    NameCapture,
    NeedClassification,
    ProblemCapture,
    DeviceSelect,
    DiagnosticLoop,
    Feedback,
    Escalation,
    TicketCreated,
    Ended,
    /// Free-form question answering; returns to the saved stage
    FreeQa,
    /// Emotional de-escalation; returns to the saved stage
    Deescalation,
}

impl Stage {
    pub const ALL: [Stage; 12] = [
        Stage::LanguageSelect,
        Stage::NameCapture,
        Stage::NeedClassification,
        Stage::ProblemCapture,
        Stage::DeviceSelect,
        Stage::DiagnosticLoop,
        Stage::Feedback,
        Stage::Escalation,
        Stage::TicketCreated,
        Stage::Ended,
        Stage::FreeQa,
        Stage::Deescalation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::LanguageSelect => "language_select",
            Stage::NameCapture => "name_capture",
            Stage::NeedClassification => "need_classification",
            Stage::ProblemCapture => "problem_capture",
            Stage::DeviceSelect => "device_select",
            Stage::DiagnosticLoop => "diagnostic_loop",
            Stage::Feedback => "feedback",
            Stage::Escalation => "escalation",
            Stage::TicketCreated => "ticket_created",
            Stage::Ended => "ended",
            Stage::FreeQa => "free_qa",
            Stage::Deescalation => "deescalation",
        }
    }

    /// Auxiliary stages interrupt the main flow and resume it afterwards
    pub fn is_auxiliary(self) -> bool {
        matches!(self, Stage::FreeQa | Stage::Deescalation)
    }

    /// Stages from which an auxiliary branch may be entered
    pub fn allows_detour(self) -> bool {
        matches!(
            self,
            Stage::NameCapture
                | Stage::NeedClassification
                | Stage::ProblemCapture
                | Stage::DeviceSelect
                | Stage::DiagnosticLoop
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Ended)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

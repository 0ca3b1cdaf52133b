//! Transition table and validation
//!
//! The machine is a validation oracle only: handlers decide which target to
//! attempt, this module decides whether the move is legal.

use super::Stage;
use crate::session::Session;
use thiserror::Error;

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: Stage, to: Stage },
    #[error("Auxiliary stage {from} has no saved return stage")]
    MissingReturnStage { from: Stage },
}

/// Targets reachable from a main-flow stage.
///
/// Auxiliary stages are not listed here; their only exits are a self-loop
/// and the saved return stage, see [`can_transition`].
pub fn allowed_targets(from: Stage) -> &'static [Stage] {
    use Stage::{
        DeviceSelect, DiagnosticLoop, Ended, Escalation, Feedback, FreeQa, LanguageSelect,
        NameCapture, NeedClassification, ProblemCapture, TicketCreated,
    };
    match from {
        Stage::LanguageSelect => &[LanguageSelect, NameCapture],
        Stage::NameCapture => &[NameCapture, NeedClassification, FreeQa, Stage::Deescalation],
        Stage::NeedClassification => &[
            NeedClassification,
            ProblemCapture,
            DeviceSelect,
            FreeQa,
            Stage::Deescalation,
        ],
        Stage::ProblemCapture => &[
            ProblemCapture,
            DeviceSelect,
            DiagnosticLoop,
            Escalation,
            FreeQa,
            Stage::Deescalation,
        ],
        Stage::DeviceSelect => &[
            DeviceSelect,
            DiagnosticLoop,
            Escalation,
            FreeQa,
            Stage::Deescalation,
        ],
        Stage::DiagnosticLoop => &[
            DiagnosticLoop,
            Feedback,
            Escalation,
            FreeQa,
            Stage::Deescalation,
        ],
        Stage::Feedback => &[Feedback, Ended],
        Stage::Escalation => &[Escalation, TicketCreated],
        Stage::TicketCreated => &[TicketCreated, Ended],
        Stage::Ended => &[Ended, LanguageSelect],
        Stage::FreeQa => &[FreeQa],
        Stage::Deescalation => &[Stage::Deescalation],
    }
}

/// Pure reachability check.
pub fn can_transition(from: Stage, to: Stage, return_stage: Option<Stage>) -> bool {
    if from.is_auxiliary() {
        return to == from || Some(to) == return_stage;
    }
    allowed_targets(from).contains(&to)
}

/// Move `session` to `target` if the table allows it.
///
/// On rejection the session is left exactly as it was and the rejected pair
/// is logged. Entering an auxiliary stage saves the current stage as the
/// single return slot; leaving it clears the slot.
pub fn attempt_transition(session: &mut Session, target: Stage) -> Result<(), TransitionError> {
    let from = session.stage();
    let return_stage = session.return_stage();

    if from.is_auxiliary() && return_stage.is_none() && target != from {
        tracing::warn!(
            conv_id = %session.id,
            from = %from,
            to = %target,
            "Rejected transition: auxiliary stage without return stage"
        );
        return Err(TransitionError::MissingReturnStage { from });
    }

    if !can_transition(from, target, return_stage) {
        tracing::warn!(
            conv_id = %session.id,
            from = %from,
            to = %target,
            "Rejected transition"
        );
        return Err(TransitionError::InvalidTransition { from, to: target });
    }

    let new_return = if target.is_auxiliary() && !from.is_auxiliary() {
        Some(from)
    } else if target.is_auxiliary() {
        return_stage
    } else {
        None
    };

    if from != target {
        tracing::debug!(conv_id = %session.id, from = %from, to = %target, "Stage transition");
    }
    session.apply_transition(target, new_return);
    Ok(())
}

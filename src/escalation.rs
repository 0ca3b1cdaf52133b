//! Escalation: turning a conversation into a ticket for a human
//!
//! The coordinator's job ends once the ticket exists. Delivery happens
//! through the `TicketDelivery` collaborator and is never retried here.

pub mod redact;

use crate::diagnostics::Intent;
use crate::messages::Msg;
use crate::session::{
    Actor, DeviceKind, Locale, OperatingSystem, Session, SkillLevel, StepOutcome, StepTier,
};
use crate::state_machine::Stage;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

const TICKET_SUFFIX_LEN: usize = 6;
/// Most recent user utterances copied (masked) into a ticket
const MAX_EXCERPT_TURNS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    UserRequested,
    RepeatedFailure,
    StepCeiling,
    NoStepsAvailable,
}

impl EscalationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EscalationReason::UserRequested => "user_requested",
            EscalationReason::RepeatedFailure => "repeated_failure",
            EscalationReason::StepCeiling => "step_ceiling",
            EscalationReason::NoStepsAvailable => "no_steps_available",
        }
    }

    pub fn describe(self, locale: Locale) -> &'static str {
        let msg = match self {
            EscalationReason::UserRequested => Msg::ReasonUserRequested,
            EscalationReason::RepeatedFailure => Msg::ReasonRepeatedFailure,
            EscalationReason::StepCeiling => Msg::ReasonStepCeiling,
            EscalationReason::NoStepsAvailable => Msg::ReasonNoStepsAvailable,
        };
        msg.text(locale)
    }
}

/// User context with free text masked. No name, no contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedContext {
    pub locale: Locale,
    pub skill_level: SkillLevel,
    pub problem: Option<String>,
    pub intent: Option<Intent>,
    pub device: Option<DeviceKind>,
    pub device_detail: Option<String>,
    pub os: Option<OperatingSystem>,
    pub image_errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptedStep {
    pub ordinal: usize,
    pub text: String,
    pub tier: StepTier,
    pub outcome: StepOutcome,
}

/// Immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub conversation_id: String,
    pub context: MaskedContext,
    pub attempted_steps: Vec<AttemptedStep>,
    pub excerpt: Vec<String>,
    pub reason: EscalationReason,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Step-by-step summary for the human agent
    pub fn summary(&self) -> String {
        let locale = self.context.locale;
        let spanish = locale.is_spanish();
        let mut lines = vec![format!("Ticket {} ({})", self.id, self.reason.describe(locale))];
        if let Some(problem) = &self.context.problem {
            lines.push(format!("{}: {problem}", if spanish { "Problema" } else { "Problem" }));
        }
        if let Some(device) = self.context.device {
            let mut device_line = format!(
                "{}: {}",
                if spanish { "Equipo" } else { "Device" },
                crate::messages::device_label(device, locale)
            );
            if let Some(detail) = &self.context.device_detail {
                device_line.push_str(&format!(" ({detail})"));
            }
            lines.push(device_line);
        }
        for error in &self.context.image_errors {
            lines.push(format!("{}: {error}", if spanish { "Error en captura" } else { "Screenshot error" }));
        }
        if self.attempted_steps.is_empty() {
            lines.push(if spanish { "Sin pasos intentados." } else { "No steps attempted." }.to_string());
        } else {
            lines.push(if spanish { "Pasos intentados:" } else { "Steps attempted:" }.to_string());
            for step in &self.attempted_steps {
                let outcome = match (step.outcome, spanish) {
                    (StepOutcome::ConfirmedDone, true) => "funcionó",
                    (StepOutcome::ConfirmedDone, false) => "worked",
                    (StepOutcome::ConfirmedFailed, true) => "sin resultado",
                    (StepOutcome::ConfirmedFailed, false) => "did not help",
                    (StepOutcome::Pending, true) => "sin confirmar",
                    (StepOutcome::Pending, false) => "not confirmed",
                };
                lines.push(format!("{}. {} [{outcome}]", step.ordinal, step.text));
            }
        }
        lines.join("\n")
    }
}

/// `TCK-YYYYMMDD-XXXXXX` with an uppercase alphanumeric suffix
pub fn generate_ticket_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TICKET_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("TCK-{}-{suffix}", now.format("%Y%m%d"))
}

/// Assemble the ticket for `session`. All free text is masked.
pub fn build_ticket(session: &Session, reason: EscalationReason, now: DateTime<Utc>) -> Ticket {
    let ctx = &session.context;
    let context = MaskedContext {
        locale: ctx.locale,
        skill_level: ctx.skill_level,
        problem: ctx.problem.as_deref().map(redact::mask),
        intent: ctx.intent,
        device: ctx.device,
        device_detail: ctx.device_detail.as_deref().map(redact::mask),
        os: ctx.os,
        image_errors: ctx
            .image_findings
            .iter()
            .filter_map(|f| f.error_text.as_deref())
            .map(redact::mask)
            .collect(),
    };

    let attempted_steps = session
        .diagnostics
        .steps()
        .iter()
        .map(|s| AttemptedStep {
            ordinal: s.ordinal,
            text: s.text.clone(),
            tier: s.tier,
            outcome: s.outcome,
        })
        .collect();

    let mut excerpt: Vec<String> = session
        .transcript()
        .iter()
        .rev()
        .filter(|t| t.actor == Actor::User && !t.raw_input.starts_with("[button]"))
        // The name and contact answers identify the user
        .filter(|t| !matches!(t.stage_before, Stage::NameCapture | Stage::Escalation))
        .take(MAX_EXCERPT_TURNS)
        .map(|t| redact::mask(&t.raw_input))
        .collect();
    excerpt.reverse();

    Ticket {
        id: generate_ticket_id(now),
        conversation_id: session.id.clone(),
        context,
        attempted_steps,
        excerpt,
        reason,
        created_at: now,
    }
}

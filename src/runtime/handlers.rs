//! Stage handlers
//!
//! One function per stage. A handler reads the normalized input, updates the
//! working copy of the session and names the stage it wants to move to. It
//! never moves the session itself; the orchestrator validates the target
//! against the transition table and runs any side effect afterwards.

use crate::contract::Button;
use crate::diagnostics::{render_step, DiagnosticEngine, Intent, NoStep};
use crate::escalation::{redact, EscalationReason};
use crate::messages::{self, Msg};
use crate::normalizer::{self as catalog, cues, Action, NormalizedInput};
use crate::session::{
    DeviceKind, Feedback, ImageFinding, Locale, NeedKind, Session, SkillLevel, StepOutcome,
};
use crate::state_machine::Stage;

/// Problem descriptions shorter than this get a re-prompt
const MIN_PROBLEM_CHARS: usize = 4;

/// Side effect the orchestrator runs once the transition is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEffect {
    /// Create the conversation's ticket, or reuse the existing one
    CreateTicket(EscalationReason),
    /// Hand the ticket and any contact to the delivery channel
    DeliverTicket,
    /// Clear per-problem state before starting over
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutput {
    pub next_stage: Stage,
    pub reply: String,
    pub buttons: Vec<Button>,
    pub effect: Option<StageEffect>,
}

impl HandlerOutput {
    fn new(next_stage: Stage, reply: impl Into<String>, buttons: Vec<Button>) -> Self {
        Self {
            next_stage,
            reply: reply.into(),
            buttons,
            effect: None,
        }
    }

    fn with_effect(mut self, effect: StageEffect) -> Self {
        self.effect = Some(effect);
        self
    }
}

fn paragraphs(first: &str, second: &str) -> String {
    format!("{first}\n\n{second}")
}

/// Run the handler for the session's current stage
pub async fn dispatch(
    session: &mut Session,
    input: &NormalizedInput,
    engine: &DiagnosticEngine,
) -> HandlerOutput {
    if let Some(output) = detour(session, input, engine).await {
        return output;
    }

    match input {
        NormalizedInput::Empty => return reprompt(session, Msg::NothingReceived),
        NormalizedInput::Unrecognized { .. } => return reprompt(session, Msg::UnrecognizedButton),
        _ => {}
    }

    match session.stage() {
        Stage::LanguageSelect => language_select(session, input),
        Stage::NameCapture => name_capture(session, input),
        Stage::NeedClassification => need_classification(session, input),
        Stage::ProblemCapture => problem_capture(session, input, engine).await,
        Stage::DeviceSelect => device_select(session, input, engine).await,
        Stage::DiagnosticLoop => diagnostic_loop(session, input, engine).await,
        Stage::Feedback => feedback(session, input),
        Stage::Escalation => escalation(session, input),
        Stage::TicketCreated => ticket_created(session, input),
        Stage::Ended => ended(session, input),
        Stage::FreeQa => free_qa(session, input, engine).await,
        Stage::Deescalation => deescalation(session, input),
    }
}

/// The deterministic prompt for the stage the session is in.
///
/// Used for re-prompts, rejected transitions and when resuming after a
/// detour.
pub fn stage_prompt(session: &Session) -> (String, Vec<Button>) {
    let locale = session.context.locale;
    let (msg, buttons) = match session.stage() {
        Stage::LanguageSelect => (Msg::LanguageReprompt, catalog::language_buttons()),
        Stage::NameCapture => (Msg::NameReprompt, catalog::name_buttons(locale)),
        Stage::NeedClassification => (Msg::NeedReprompt, catalog::need_buttons(locale)),
        Stage::ProblemCapture => (Msg::ProblemReprompt, Vec::new()),
        Stage::DeviceSelect => (Msg::AskDevice, catalog::device_buttons(locale)),
        Stage::DiagnosticLoop => return current_step_prompt(session, Msg::LoopReprompt),
        Stage::Feedback => (Msg::FeedbackReprompt, catalog::feedback_buttons(locale)),
        Stage::Escalation => (Msg::EscalationReprompt, catalog::escalation_buttons(locale)),
        Stage::TicketCreated => {
            let mut reply = Msg::TicketCreatedReprompt.text(locale).to_string();
            if let Some(id) = &session.ticket_id {
                reply = paragraphs(&reply, &messages::ticket_line(locale, id));
            }
            return (reply, catalog::ticket_buttons(locale));
        }
        Stage::Ended => (Msg::EndedReprompt, catalog::ended_buttons(locale)),
        Stage::FreeQa => (Msg::FreeQaFollowUp, catalog::resume_buttons(locale)),
        Stage::Deescalation => (Msg::DeescalationReprompt, catalog::resume_buttons(locale)),
    };
    (msg.text(locale).to_string(), buttons)
}

/// `lead` followed by the stage prompt, staying where we are
fn reprompt(session: &Session, lead: Msg) -> HandlerOutput {
    let (prompt, buttons) = stage_prompt(session);
    let lead = lead.text(session.context.locale);
    let reply = if prompt.starts_with(lead) {
        prompt
    } else {
        paragraphs(lead, &prompt)
    };
    HandlerOutput::new(session.stage(), reply, buttons)
}

fn current_step_prompt(session: &Session, lead: Msg) -> (String, Vec<Button>) {
    let locale = session.context.locale;
    match session.diagnostics.current() {
        Some(step) => (
            paragraphs(
                lead.text(locale),
                &render_step(step, session.context.skill_level, locale),
            ),
            catalog::step_buttons(locale, step.ordinal),
        ),
        None => (lead.text(locale).to_string(), Vec::new()),
    }
}

// ============================================================================
// Detours
// ============================================================================

/// Loop inputs that carry their own meaning even when phrased as a question
fn is_loop_signal(text: &str) -> bool {
    cues::wants_human(text)
        || cues::asks_for_explanation(text)
        || cues::says_still_broken(text)
        || cues::says_worked(text)
}

/// Frustration and off-script questions, checked before the stage handler
async fn detour(
    session: &mut Session,
    input: &NormalizedInput,
    engine: &DiagnosticEngine,
) -> Option<HandlerOutput> {
    let stage = session.stage();
    if !stage.allows_detour() {
        return None;
    }
    let locale = session.context.locale;

    if input.action() == Some(Action::AskQuestion) {
        return Some(HandlerOutput::new(
            Stage::FreeQa,
            Msg::FreeQaPrompt.text(locale),
            catalog::resume_buttons(locale),
        ));
    }

    let NormalizedInput::Text(text) = input else {
        return None;
    };

    if cues::is_frustrated(text) {
        session.diagnostics.reset_failures();
        return Some(HandlerOutput::new(
            Stage::Deescalation,
            Msg::Deescalation.text(locale),
            catalog::resume_buttons(locale),
        ));
    }

    // A problem statement is often phrased as a question
    let question = cues::is_question(text)
        && stage != Stage::ProblemCapture
        && !(stage == Stage::DiagnosticLoop && is_loop_signal(text));
    if question {
        session.diagnostics.reset_failures();
        let answer = engine.answer_question(&session.context, text).await;
        return Some(HandlerOutput::new(
            Stage::FreeQa,
            paragraphs(&answer, Msg::FreeQaFollowUp.text(locale)),
            catalog::resume_buttons(locale),
        ));
    }
    None
}

/// Leave an auxiliary stage for the saved return stage
fn resume(session: &Session) -> HandlerOutput {
    let locale = session.context.locale;
    let Some(target) = session.return_stage() else {
        // The transition check rejects this and the orchestrator re-prompts
        return HandlerOutput::new(Stage::LanguageSelect, "", Vec::new());
    };

    let (prompt, buttons) = match target {
        Stage::DiagnosticLoop => current_step_prompt(session, Msg::Resume),
        Stage::NameCapture => (
            paragraphs(Msg::Resume.text(locale), Msg::AskName.text(locale)),
            catalog::name_buttons(locale),
        ),
        Stage::NeedClassification => (
            paragraphs(Msg::Resume.text(locale), Msg::AskNeed.text(locale)),
            catalog::need_buttons(locale),
        ),
        Stage::ProblemCapture => {
            let ask = match session.context.need {
                Some(NeedKind::Task) => Msg::AskTask,
                _ => Msg::AskProblem,
            };
            (
                paragraphs(Msg::Resume.text(locale), ask.text(locale)),
                Vec::new(),
            )
        }
        Stage::DeviceSelect => (
            paragraphs(Msg::Resume.text(locale), Msg::AskDevice.text(locale)),
            catalog::device_buttons(locale),
        ),
        _ => (Msg::Resume.text(locale).to_string(), Vec::new()),
    };
    HandlerOutput::new(target, prompt, buttons)
}

async fn free_qa(
    session: &mut Session,
    input: &NormalizedInput,
    engine: &DiagnosticEngine,
) -> HandlerOutput {
    let locale = session.context.locale;
    match input {
        NormalizedInput::Action(Action::Resume | Action::No) => resume(session),
        NormalizedInput::Text(text) if cues::is_frustrated(text) => HandlerOutput::new(
            Stage::FreeQa,
            paragraphs(Msg::Deescalation.text(locale), Msg::FreeQaFollowUp.text(locale)),
            catalog::resume_buttons(locale),
        ),
        NormalizedInput::Text(text) => {
            let answer = engine.answer_question(&session.context, text).await;
            HandlerOutput::new(
                Stage::FreeQa,
                paragraphs(&answer, Msg::FreeQaFollowUp.text(locale)),
                catalog::resume_buttons(locale),
            )
        }
        _ => reprompt(session, Msg::FreeQaFollowUp),
    }
}

fn deescalation(session: &mut Session, input: &NormalizedInput) -> HandlerOutput {
    match input {
        NormalizedInput::Action(Action::Resume | Action::Yes) => resume(session),
        NormalizedInput::Text(text) if !cues::is_frustrated(text) => resume(session),
        _ => reprompt(session, Msg::DeescalationReprompt),
    }
}

// ============================================================================
// Collecting stages
// ============================================================================

fn choose_language(session: &mut Session, locale: Locale) -> HandlerOutput {
    session.context.locale = locale;
    HandlerOutput::new(
        Stage::NameCapture,
        Msg::AskName.text(locale),
        catalog::name_buttons(locale),
    )
}

fn language_select(session: &mut Session, input: &NormalizedInput) -> HandlerOutput {
    match input {
        NormalizedInput::Action(Action::Language(locale)) => choose_language(session, *locale),
        NormalizedInput::Text(text) => match cues::parse_language(text) {
            Some(locale) => choose_language(session, locale),
            None => reprompt(session, Msg::LanguageReprompt),
        },
        _ => reprompt(session, Msg::LanguageReprompt),
    }
}

fn ask_need(session: &Session) -> HandlerOutput {
    let locale = session.context.locale;
    HandlerOutput::new(
        Stage::NeedClassification,
        format!(
            "{} {}",
            messages::nice_to_meet(locale, session.first_name()),
            Msg::AskNeed.text(locale)
        ),
        catalog::need_buttons(locale),
    )
}

fn name_capture(session: &mut Session, input: &NormalizedInput) -> HandlerOutput {
    match input {
        NormalizedInput::Action(Action::SkipName) => {
            session.context.display_name = None;
            ask_need(session)
        }
        NormalizedInput::Text(text) => match cues::extract_name(text) {
            Some(name) => {
                session.context.display_name = Some(name);
                ask_need(session)
            }
            None => reprompt(session, Msg::NameReprompt),
        },
        _ => reprompt(session, Msg::NameReprompt),
    }
}

fn need_classification(session: &mut Session, input: &NormalizedInput) -> HandlerOutput {
    let locale = session.context.locale;
    match input {
        NormalizedInput::Action(Action::Need(kind)) => {
            session.context.need = Some(*kind);
            let ask = match kind {
                NeedKind::Problem => Msg::AskProblem,
                NeedKind::Task => Msg::AskTask,
            };
            HandlerOutput::new(Stage::ProblemCapture, ask.text(locale), Vec::new())
        }
        // A typed description skips the button and counts as the problem
        NormalizedInput::Text(text) if text.chars().count() >= MIN_PROBLEM_CHARS => {
            session.context.need = Some(NeedKind::Problem);
            record_problem(session, text);
            HandlerOutput::new(
                Stage::DeviceSelect,
                Msg::AskDevice.text(locale),
                catalog::device_buttons(locale),
            )
        }
        _ => reprompt(session, Msg::NeedReprompt),
    }
}

fn record_problem(session: &mut Session, text: &str) {
    let context = &mut session.context;
    context.problem = Some(text.to_string());
    context.intent = Some(Intent::classify(text));
    if let Some(skill) = cues::infer_skill(text) {
        context.skill_level = skill;
    }
    if let Some(os) = cues::detect_os(text) {
        context.os = Some(os);
    }
}

/// Text a finding contributes as problem description
fn finding_text(finding: &ImageFinding) -> Option<String> {
    let parts: Vec<&str> = [finding.summary.as_deref(), finding.error_text.as_deref()]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(". "))
}

async fn problem_capture(
    session: &mut Session,
    input: &NormalizedInput,
    engine: &DiagnosticEngine,
) -> HandlerOutput {
    let (description, device_hint) = match input {
        NormalizedInput::Action(Action::Escalate) => {
            return escalate(session, EscalationReason::UserRequested);
        }
        NormalizedInput::Text(text) if cues::wants_human(text) => {
            return escalate(session, EscalationReason::UserRequested);
        }
        NormalizedInput::Text(text) => (Some(text.clone()), None),
        NormalizedInput::Image { finding, caption } => {
            let from_image = finding.as_ref().and_then(finding_text);
            let description = match (caption, from_image) {
                (Some(caption), Some(found)) => Some(format!("{caption}. {found}")),
                (Some(caption), None) => Some(caption.clone()),
                (None, found) => found,
            };
            let hint = finding.as_ref().and_then(|f| f.device_hint.clone());
            (description, hint)
        }
        _ => (None, None),
    };

    let Some(description) = description.filter(|d| d.chars().count() >= MIN_PROBLEM_CHARS) else {
        let lead = if matches!(input, NormalizedInput::Image { .. }) {
            Msg::ImageReceived
        } else {
            Msg::ProblemReprompt
        };
        return reprompt(session, lead);
    };

    record_problem(session, &description);
    let device = cues::mentions_specific_device(&description)
        .or_else(|| device_hint.as_deref().and_then(cues::mentions_specific_device));

    match device {
        Some(kind) => {
            session.context.device = Some(kind);
            first_step(session, engine).await
        }
        None => {
            let locale = session.context.locale;
            HandlerOutput::new(
                Stage::DeviceSelect,
                Msg::AskDevice.text(locale),
                catalog::device_buttons(locale),
            )
        }
    }
}

async fn device_select(
    session: &mut Session,
    input: &NormalizedInput,
    engine: &DiagnosticEngine,
) -> HandlerOutput {
    let text = match input {
        NormalizedInput::Action(Action::Escalate) => {
            return escalate(session, EscalationReason::UserRequested);
        }
        NormalizedInput::Text(text) => text.as_str(),
        NormalizedInput::Image {
            finding: Some(finding),
            ..
        } => finding.device_hint.as_deref().unwrap_or_default(),
        _ => "",
    };

    if cues::wants_human(text) {
        return escalate(session, EscalationReason::UserRequested);
    }

    match cues::detect_device(text) {
        Some(kind) => session.context.device = Some(kind),
        // Anything else typed here is taken as the model name
        None if text.chars().count() >= 3 => {
            session.context.device = Some(DeviceKind::Other);
            session.context.device_detail = Some(text.to_string());
        }
        None => return reprompt(session, Msg::DeviceReprompt),
    }
    if let Some(os) = cues::detect_os(text) {
        session.context.os = Some(os);
    }
    first_step(session, engine).await
}

// ============================================================================
// Diagnostic loop
// ============================================================================

fn step_output(session: &Session, lead: Option<&str>) -> HandlerOutput {
    let locale = session.context.locale;
    let Some(step) = session.diagnostics.current() else {
        return HandlerOutput::new(Stage::DiagnosticLoop, Msg::LoopReprompt.text(locale), Vec::new());
    };
    let rendered = render_step(step, session.context.skill_level, locale);
    let reply = match lead {
        Some(lead) => paragraphs(lead, &rendered),
        None => rendered,
    };
    HandlerOutput::new(
        Stage::DiagnosticLoop,
        reply,
        catalog::step_buttons(locale, step.ordinal),
    )
}

async fn first_step(session: &mut Session, engine: &DiagnosticEngine) -> HandlerOutput {
    match engine
        .next_step(&session.context, &mut session.diagnostics)
        .await
    {
        Ok(_) => step_output(session, None),
        Err(reason) => escalate(session, escalation_reason(reason)),
    }
}

fn escalation_reason(reason: NoStep) -> EscalationReason {
    match reason {
        NoStep::Ceiling => EscalationReason::StepCeiling,
        NoStep::Exhausted => EscalationReason::NoStepsAvailable,
    }
}

fn escalate(session: &mut Session, reason: EscalationReason) -> HandlerOutput {
    let locale = session.context.locale;
    session.escalation_eligible = true;
    let intro = Msg::EscalationIntro.text(locale);
    let reply = if reason == EscalationReason::NoStepsAvailable {
        paragraphs(Msg::NoStepsLeft.text(locale), intro)
    } else {
        intro.to_string()
    };
    HandlerOutput::new(Stage::Escalation, reply, catalog::escalation_buttons(locale))
        .with_effect(StageEffect::CreateTicket(reason))
}

/// What a loop input means, buttons and typed text alike
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopSignal {
    Worked,
    StillBroken,
    Explain(Option<usize>),
    Back,
    Escalate,
    Other,
}

fn loop_signal(session: &Session, input: &NormalizedInput) -> LoopSignal {
    match input {
        NormalizedInput::Action(Action::StepWorked) => LoopSignal::Worked,
        NormalizedInput::Action(Action::StillBroken) => LoopSignal::StillBroken,
        NormalizedInput::Action(Action::ExplainStep(n)) => LoopSignal::Explain(*n),
        NormalizedInput::Action(Action::GoBack) => LoopSignal::Back,
        NormalizedInput::Action(Action::Escalate) => LoopSignal::Escalate,
        NormalizedInput::Action(Action::Yes) if session.escalation_eligible => LoopSignal::Escalate,
        NormalizedInput::Text(text) => {
            if cues::wants_human(text) {
                LoopSignal::Escalate
            } else if cues::asks_for_explanation(text) {
                LoopSignal::Explain(None)
            } else if cues::says_still_broken(text) {
                // "no anda" contains "anda"
                LoopSignal::StillBroken
            } else if cues::says_worked(text) {
                LoopSignal::Worked
            } else {
                LoopSignal::Other
            }
        }
        _ => LoopSignal::Other,
    }
}

async fn diagnostic_loop(
    session: &mut Session,
    input: &NormalizedInput,
    engine: &DiagnosticEngine,
) -> HandlerOutput {
    let locale = session.context.locale;
    match loop_signal(session, input) {
        LoopSignal::Worked => {
            session.diagnostics.mark_current(StepOutcome::ConfirmedDone);
            session.diagnostics.reset_failures();
            HandlerOutput::new(
                Stage::Feedback,
                Msg::AskFeedback.text(locale),
                catalog::feedback_buttons(locale),
            )
        }
        LoopSignal::StillBroken => {
            let run = session.diagnostics.record_still_broken();
            session.escalation_eligible = true;
            if run >= 2 {
                return escalate(session, EscalationReason::RepeatedFailure);
            }
            match engine
                .next_step(&session.context, &mut session.diagnostics)
                .await
            {
                Ok(_) => step_output(session, None),
                Err(reason) => escalate(session, escalation_reason(reason)),
            }
        }
        LoopSignal::Explain(ordinal) => {
            session.diagnostics.reset_failures();
            let target = ordinal
                .and_then(|n| session.diagnostics.step(n))
                .or_else(|| session.diagnostics.current())
                .cloned();
            let Some(step) = target else {
                return reprompt(session, Msg::LoopReprompt);
            };
            session.context.skill_level = SkillLevel::Beginner;
            let explanation = engine.explain_step(&session.context, &step).await;
            step_output(session, Some(&explanation))
        }
        LoopSignal::Back => {
            session.diagnostics.reset_failures();
            if session.diagnostics.go_back().is_some() {
                step_output(session, None)
            } else {
                step_output(session, Some(Msg::GoBackNothing.text(locale)))
            }
        }
        LoopSignal::Escalate => escalate(session, EscalationReason::UserRequested),
        LoopSignal::Other => {
            session.diagnostics.reset_failures();
            let lead = if matches!(input, NormalizedInput::Image { .. }) {
                Msg::ImageReceived
            } else {
                Msg::LoopReprompt
            };
            let (reply, buttons) = current_step_prompt(session, lead);
            HandlerOutput::new(Stage::DiagnosticLoop, reply, buttons)
        }
    }
}

// ============================================================================
// Closing stages
// ============================================================================

fn close_with_thanks(session: &Session) -> HandlerOutput {
    let locale = session.context.locale;
    HandlerOutput::new(
        Stage::Ended,
        paragraphs(Msg::FeedbackThanks.text(locale), Msg::Goodbye.text(locale)),
        catalog::ended_buttons(locale),
    )
}

fn feedback(session: &mut Session, input: &NormalizedInput) -> HandlerOutput {
    match input {
        NormalizedInput::Action(Action::Feedback(rating)) => {
            let entry = session.feedback.get_or_insert(Feedback {
                rating: None,
                comment: None,
            });
            entry.rating = Some(*rating);
            close_with_thanks(session)
        }
        NormalizedInput::Text(text) => {
            let entry = session.feedback.get_or_insert(Feedback {
                rating: None,
                comment: None,
            });
            entry.comment = Some(redact::mask(text));
            close_with_thanks(session)
        }
        NormalizedInput::Action(Action::End | Action::No) => close_with_thanks(session),
        _ => reprompt(session, Msg::FeedbackReprompt),
    }
}

fn escalation(session: &mut Session, input: &NormalizedInput) -> HandlerOutput {
    let locale = session.context.locale;
    let deliver = HandlerOutput::new(
        Stage::TicketCreated,
        Msg::TicketDelivered.text(locale),
        catalog::ticket_buttons(locale),
    )
    .with_effect(StageEffect::DeliverTicket);

    match input {
        NormalizedInput::Action(Action::SkipContact | Action::No) => {
            session.context.contact = None;
            deliver
        }
        NormalizedInput::Text(text) if redact::looks_like_contact(text) => {
            session.context.contact = Some(text.clone());
            deliver
        }
        _ => reprompt(session, Msg::EscalationReprompt),
    }
}

fn ticket_created(session: &mut Session, input: &NormalizedInput) -> HandlerOutput {
    let locale = session.context.locale;
    match input {
        NormalizedInput::Action(Action::End | Action::Yes | Action::No) => HandlerOutput::new(
            Stage::Ended,
            Msg::Goodbye.text(locale),
            catalog::ended_buttons(locale),
        ),
        _ => reprompt(session, Msg::TicketCreatedReprompt),
    }
}

fn ended(session: &mut Session, input: &NormalizedInput) -> HandlerOutput {
    let locale = session.context.locale;
    match input {
        NormalizedInput::Action(Action::Restart) | NormalizedInput::Text(_) => HandlerOutput::new(
            Stage::LanguageSelect,
            Msg::Greeting.text(locale),
            catalog::language_buttons(),
        )
        .with_effect(StageEffect::Reset),
        _ => reprompt(session, Msg::EndedReprompt),
    }
}

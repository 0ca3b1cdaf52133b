//! Prompts for the generative backend and sanitization of what comes back

use crate::llm::{LlmMessage, LlmRequest};
use crate::session::{DiagnosticMemory, SessionContext, SkillLevel, StepTier};
use thiserror::Error;

pub const MIN_STEP_CHARS: usize = 8;
pub const MAX_STEP_CHARS: usize = 400;
const MAX_ANSWER_CHARS: usize = 1200;

const STEP_MAX_TOKENS: u32 = 200;
const ANSWER_MAX_TOKENS: u32 = 500;

const SYSTEM_PROMPT: &str = "You are a patient technical support assistant for home users. \
You never ask for passwords or payment details. You reply in the requested language only.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Malformed {
    #[error("empty output")]
    Empty,
    #[error("step too short ({0} chars)")]
    TooShort(usize),
    #[error("step too long ({0} chars)")]
    TooLong(usize),
}

fn language_name(context: &SessionContext) -> &'static str {
    match context.locale {
        crate::session::Locale::EsAr => "Spanish as spoken in Argentina",
        crate::session::Locale::EsEs => "Spanish as spoken in Spain",
        crate::session::Locale::En => "English",
    }
}

fn describe_context(context: &SessionContext) -> String {
    let mut lines = Vec::new();
    if let Some(problem) = &context.problem {
        lines.push(format!("Problem: {problem}"));
    }
    if let Some(device) = context.device {
        lines.push(format!("Device: {device:?}"));
    }
    if let Some(detail) = &context.device_detail {
        lines.push(format!("Device model: {detail}"));
    }
    if let Some(os) = context.os {
        lines.push(format!("Operating system: {os:?}"));
    }
    for finding in &context.image_findings {
        if let Some(error) = &finding.error_text {
            lines.push(format!("Error visible in screenshot: {error}"));
        }
        if let Some(summary) = &finding.summary {
            lines.push(format!("Screenshot summary: {summary}"));
        }
    }
    let skill = match context.skill_level {
        SkillLevel::Beginner => "beginner, avoid jargon",
        SkillLevel::Intermediate => "intermediate",
        SkillLevel::Advanced => "advanced, technical terms are fine",
    };
    lines.push(format!("User skill level: {skill}"));
    lines.join("\n")
}

pub fn step_request(
    context: &SessionContext,
    memory: &DiagnosticMemory,
    tier: StepTier,
    rejected: Option<&str>,
) -> LlmRequest {
    let tier_hint = match tier {
        StepTier::Basic => "a basic check any user can do safely",
        StepTier::Advanced => "a more advanced check, still safe and reversible",
    };
    let mut prompt = format!(
        "{}\n\nPropose exactly one next troubleshooting step: {tier_hint}. \
         Reply with a single sentence in {}, no numbering, no preamble.",
        describe_context(context),
        language_name(context),
    );
    let issued = memory.issued_texts();
    if !issued.is_empty() {
        prompt.push_str("\n\nSteps already tried (do not repeat or rephrase any of them):");
        for text in issued {
            prompt.push_str("\n- ");
            prompt.push_str(text);
        }
    }
    let mut request = LlmRequest::prompt(SYSTEM_PROMPT, prompt).with_max_tokens(STEP_MAX_TOKENS);
    if let Some(rejected) = rejected {
        request.messages.push(LlmMessage::assistant(rejected));
        request.messages.push(LlmMessage::user(
            "That repeated an earlier step. Propose a different one, same format.",
        ));
    }
    request
}

pub fn explain_request(context: &SessionContext, step_text: &str) -> LlmRequest {
    let prompt = format!(
        "{}\n\nExplain how to carry out this step in simple terms, in at most five short \
         sentences, in {}:\n{step_text}",
        describe_context(context),
        language_name(context),
    );
    LlmRequest::prompt(SYSTEM_PROMPT, prompt).with_max_tokens(ANSWER_MAX_TOKENS)
}

pub fn question_request(context: &SessionContext, question: &str) -> LlmRequest {
    let prompt = format!(
        "{}\n\nAnswer the user's question briefly, in {}. If it is unrelated to technical \
         support, say so politely.\nQuestion: {question}",
        describe_context(context),
        language_name(context),
    );
    LlmRequest::prompt(SYSTEM_PROMPT, prompt).with_max_tokens(ANSWER_MAX_TOKENS)
}

/// Strip list markers like `1.`, `2)`, `-`, `*`, `•` and `Step 3:` prefixes
fn strip_marker(line: &str) -> &str {
    let mut rest = line.trim();
    for prefix in ["Step", "step", "Paso", "paso"] {
        if let Some(after) = rest.strip_prefix(prefix) {
            let after = after.trim_start().trim_start_matches(|c: char| c.is_ascii_digit());
            if let Some(after) = after.strip_prefix(':') {
                rest = after.trim_start();
            }
        }
    }
    let without_bullet = rest.trim_start_matches(['-', '*', '•']).trim_start();
    let digits = without_bullet.trim_start_matches(|c: char| c.is_ascii_digit());
    if digits.len() < without_bullet.len() {
        if let Some(after) = digits.strip_prefix('.').or_else(|| digits.strip_prefix(')')) {
            return after.trim_start();
        }
    }
    without_bullet
}

/// First meaningful line of generated output, or why there is none
pub fn sanitize_step(raw: &str) -> Result<String, Malformed> {
    let line = raw
        .lines()
        .map(strip_marker)
        .map(|l| l.trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace()))
        .find(|l| !l.is_empty() && !l.ends_with(':'))
        .ok_or(Malformed::Empty)?;

    let count = line.chars().count();
    if count < MIN_STEP_CHARS {
        return Err(Malformed::TooShort(count));
    }
    if count > MAX_STEP_CHARS {
        return Err(Malformed::TooLong(count));
    }
    Ok(line.to_string())
}

/// Free-form answers keep their paragraphs but are capped
pub fn sanitize_answer(raw: &str) -> Result<String, Malformed> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Malformed::Empty);
    }
    Ok(trimmed.chars().take(MAX_ANSWER_CHARS).collect())
}

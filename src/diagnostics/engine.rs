//! Diagnostic step engine

use super::bounded::BoundedCall;
use super::{fallback, prompt, Intent};
use crate::messages::Msg;
use crate::runtime::LlmClient;
use crate::session::{DiagnosticMemory, SessionContext, StepDescriptor, StepSource, StepTier};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Backend attempts per step; the second only happens after a duplicate
const MAX_GENERATION_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NoStep {
    #[error("step ceiling reached")]
    Ceiling,
    #[error("no non-duplicate step available")]
    Exhausted,
}

/// Produces diagnostic steps, explanations and short answers.
///
/// Built once from configuration: with a backend it is "assisted", without
/// one it is "rules only". The calling code is the same either way.
pub struct DiagnosticEngine {
    backend: Option<Arc<dyn LlmClient>>,
    bounded: BoundedCall,
}

impl DiagnosticEngine {
    pub fn new(backend: Option<Arc<dyn LlmClient>>, step_timeout: Duration) -> Self {
        Self {
            backend,
            bounded: BoundedCall::new(step_timeout),
        }
    }

    pub fn rules_only() -> Self {
        Self::new(None, Duration::from_secs(1))
    }

    pub fn mode_name(&self) -> &'static str {
        if self.backend.is_some() {
            "assisted"
        } else {
            "rules_only"
        }
    }

    pub fn model_id(&self) -> Option<&str> {
        self.backend.as_deref().map(LlmClient::model_id)
    }

    pub fn bounded(&self) -> BoundedCall {
        self.bounded
    }

    /// Issue the next step into `memory`.
    ///
    /// Never fails because of the backend: timeouts, errors and malformed or
    /// repeated output all end in the fallback table.
    pub async fn next_step(
        &self,
        context: &SessionContext,
        memory: &mut DiagnosticMemory,
    ) -> Result<StepDescriptor, NoStep> {
        let tier = memory.next_tier().ok_or(NoStep::Ceiling)?;

        if let Some(text) = self.generate(context, memory, tier).await {
            if let Ok(step) = memory.push(text, tier, StepSource::Generative) {
                return Ok(step.clone());
            }
        }

        let intent = context
            .intent
            .unwrap_or_else(|| Intent::classify(context.problem.as_deref().unwrap_or_default()));
        let text = fallback::pick(intent, tier, context.locale, memory).ok_or(NoStep::Exhausted)?;
        tracing::debug!(intent = intent.as_str(), ?tier, "Using fallback step");
        memory
            .push(text, tier, StepSource::Fallback)
            .map(|step| step.clone())
            .map_err(|_| NoStep::Exhausted)
    }

    async fn generate(
        &self,
        context: &SessionContext,
        memory: &DiagnosticMemory,
        tier: StepTier,
    ) -> Option<String> {
        let backend = self.backend.as_ref()?;
        let mut rejected: Option<String> = None;

        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let request = prompt::step_request(context, memory, tier, rejected.as_deref());
            let response = self
                .bounded
                .run("diagnostic_step", backend.complete(&request))
                .await
                .ok()?;

            match prompt::sanitize_step(&response.text) {
                Ok(text) if !memory.is_duplicate(&text) => return Some(text),
                Ok(text) => {
                    tracing::info!(attempt, "Generated step repeats an earlier one");
                    rejected = Some(text);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Malformed generated step");
                    return None;
                }
            }
        }
        None
    }

    /// Plain-language explanation of a step, canned when the backend is
    /// unavailable
    pub async fn explain_step(&self, context: &SessionContext, step: &StepDescriptor) -> String {
        let generated = match &self.backend {
            Some(backend) => {
                let request = prompt::explain_request(context, &step.text);
                self.bounded
                    .run("explain_step", backend.complete(&request))
                    .await
                    .ok()
                    .and_then(|r| prompt::sanitize_answer(&r.text).ok())
            }
            None => None,
        };
        generated.unwrap_or_else(|| Msg::ExplainFallback.text(context.locale).to_string())
    }

    /// Short answer to an off-script question
    pub async fn answer_question(&self, context: &SessionContext, question: &str) -> String {
        let generated = match &self.backend {
            Some(backend) => {
                let request = prompt::question_request(context, question);
                self.bounded
                    .run("free_question", backend.complete(&request))
                    .await
                    .ok()
                    .and_then(|r| prompt::sanitize_answer(&r.text).ok())
            }
            None => None,
        };
        generated.unwrap_or_else(|| Msg::FreeQaFallback.text(context.locale).to_string())
    }
}

//! Diagnostic memory: the steps already issued in a conversation

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_BASIC_STEPS: usize = 5;
pub const MAX_ADVANCED_STEPS: usize = 5;
/// Hard ceiling; reaching it forces escalation
pub const MAX_STEPS: usize = MAX_BASIC_STEPS + MAX_ADVANCED_STEPS;

/// Shorter normalized texts only count as duplicates on exact match
const MIN_CONTAINMENT_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTier {
    Basic,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    #[default]
    Pending,
    ConfirmedDone,
    ConfirmedFailed,
}

/// Where a step's text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepSource {
    Generative,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
    /// 1-based position in the conversation
    pub ordinal: usize,
    pub text: String,
    pub tier: StepTier,
    pub outcome: StepOutcome,
    pub source: StepSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Step duplicates an earlier instruction: {0}")]
pub struct DuplicateStep(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiagnosticMemory {
    steps: Vec<StepDescriptor>,
    /// "Still broken" signals received in direct succession
    consecutive_failures: u32,
    /// Index of the step currently shown (differs from the last one after "go back")
    cursor: Option<usize>,
}

impl DiagnosticMemory {
    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn at_ceiling(&self) -> bool {
        self.steps.len() >= MAX_STEPS
    }

    pub fn basic_count(&self) -> usize {
        self.steps.iter().filter(|s| s.tier == StepTier::Basic).count()
    }

    pub fn advanced_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.tier == StepTier::Advanced)
            .count()
    }

    /// Tier the next step must belong to, or `None` at the ceiling
    pub fn next_tier(&self) -> Option<StepTier> {
        if self.basic_count() < MAX_BASIC_STEPS {
            Some(StepTier::Basic)
        } else if self.advanced_count() < MAX_ADVANCED_STEPS {
            Some(StepTier::Advanced)
        } else {
            None
        }
    }

    pub fn issued_texts(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn is_duplicate(&self, text: &str) -> bool {
        self.steps.iter().any(|s| is_duplicate_step(&s.text, text))
    }

    /// Record a new step and make it current.
    ///
    /// Refuses text that duplicates any earlier step, so the memory can never
    /// hold two equivalent instructions.
    pub fn push(
        &mut self,
        text: impl Into<String>,
        tier: StepTier,
        source: StepSource,
    ) -> Result<&StepDescriptor, DuplicateStep> {
        let text = text.into();
        if self.is_duplicate(&text) {
            return Err(DuplicateStep(text));
        }
        let index = self.steps.len();
        self.steps.push(StepDescriptor {
            ordinal: index + 1,
            text,
            tier,
            outcome: StepOutcome::Pending,
            source,
        });
        self.cursor = Some(index);
        Ok(&self.steps[index])
    }

    pub fn current(&self) -> Option<&StepDescriptor> {
        self.cursor.and_then(|i| self.steps.get(i))
    }

    pub fn step(&self, ordinal: usize) -> Option<&StepDescriptor> {
        ordinal.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    pub fn has_previous(&self) -> bool {
        self.cursor.is_some_and(|i| i > 0)
    }

    pub fn mark_current(&mut self, outcome: StepOutcome) {
        if let Some(step) = self.cursor.and_then(|i| self.steps.get_mut(i)) {
            step.outcome = outcome;
        }
    }

    /// Count a "still broken" signal; returns the run length so far
    pub fn record_still_broken(&mut self) -> u32 {
        self.mark_current(StepOutcome::ConfirmedFailed);
        self.consecutive_failures += 1;
        self.consecutive_failures
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Any other signal breaks the run
    pub fn reset_failures(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Move the cursor one step back and return that step
    pub fn go_back(&mut self) -> Option<&StepDescriptor> {
        let index = self.cursor?.checked_sub(1)?;
        self.cursor = Some(index);
        let step = &mut self.steps[index];
        step.outcome = StepOutcome::Pending;
        Some(&*step)
    }
}

/// Lowercase, strip punctuation, collapse whitespace
fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case-insensitive equality or containment in either direction
pub fn is_duplicate_step(existing: &str, candidate: &str) -> bool {
    let a = normalize(existing);
    let b = normalize(candidate);
    if a.is_empty() || b.is_empty() {
        return a == b;
    }
    if a == b {
        return true;
    }
    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    shorter.len() >= MIN_CONTAINMENT_LEN && longer.contains(shorter.as_str())
}

//! Diagnostic steps: intent classification, the fallback table, the bounded
//! backend call and the engine tying them together.

mod bounded;
mod engine;
mod fallback;
mod intent;
mod prompt;

pub use engine::{DiagnosticEngine, NoStep};
pub use intent::Intent;

use crate::messages::Msg;
use crate::session::{Locale, SkillLevel, StepDescriptor};

/// Step text as shown to the user. Skill level changes the wording around a
/// step, never the step itself.
pub fn render_step(step: &StepDescriptor, skill: SkillLevel, locale: Locale) -> String {
    let mut text = format!("{} {}: {}", Msg::StepPrefix.text(locale), step.ordinal, step.text);
    if skill == SkillLevel::Beginner {
        text.push_str("\n\n");
        text.push_str(Msg::BeginnerHint.text(locale));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{StepOutcome, StepSource, StepTier};

    #[test]
    fn test_render_step_only_adds_hint_for_beginners() {
        let step = StepDescriptor {
            ordinal: 2,
            text: "Check the cable.".to_string(),
            tier: StepTier::Basic,
            outcome: StepOutcome::Pending,
            source: StepSource::Fallback,
        };
        assert_eq!(render_step(&step, SkillLevel::Advanced, Locale::En), "Step 2: Check the cable.");
        let beginner = render_step(&step, SkillLevel::Beginner, Locale::En);
        assert!(beginner.starts_with("Step 2: Check the cable."));
        assert!(beginner.contains(Msg::BeginnerHint.text(Locale::En)));
    }
}

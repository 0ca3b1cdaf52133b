//! Property-based tests for whole dialogues
//!
//! Arbitrary button and text sequences, rules-only engine: every turn must
//! produce a reply and leave a consistent transcript behind.

use super::testing::TestHarness;
use crate::contract::ChatResponse;
use crate::diagnostics::DiagnosticEngine;
use crate::normalizer::{
    BTN_BACK, BTN_END, BTN_ESCALATE, BTN_FEEDBACK_GOOD, BTN_HELP, BTN_LANG_EN, BTN_LANG_ES_AR,
    BTN_NO, BTN_NO_NAME, BTN_PERSIST, BTN_QUESTION, BTN_RESTART, BTN_RESUME, BTN_SKIP_CONTACT,
    BTN_SOLVED, BTN_TASK, BTN_YES,
};
use crate::state_machine::Stage;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Input {
    Button(&'static str),
    Text(String),
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_button() -> impl Strategy<Value = &'static str> {
    proptest::sample::select(vec![
        BTN_LANG_EN,
        BTN_LANG_ES_AR,
        BTN_NO_NAME,
        BTN_HELP,
        BTN_TASK,
        BTN_QUESTION,
        BTN_SOLVED,
        BTN_PERSIST,
        BTN_BACK,
        BTN_ESCALATE,
        BTN_YES,
        BTN_NO,
        BTN_SKIP_CONTACT,
        BTN_FEEDBACK_GOOD,
        BTN_RESUME,
        BTN_RESTART,
        BTN_END,
        "BTN_DEV_ROUTER",
        "BTN_DEV_NOTEBOOK",
        "BTN_HELP_STEP_1",
        "BTN_HELP_STEP_9",
        "BTN_NOT_A_BUTTON",
    ])
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("   ".to_string()),
        Just("my wifi keeps dropping".to_string()),
        Just("la impresora no imprime".to_string()),
        Just("what does that mean?".to_string()),
        Just("this is useless, I'm so angry".to_string()),
        Just("still not working".to_string()),
        Just("it worked".to_string()),
        Just("I want to talk to a human".to_string()),
        Just("ana@example.com".to_string()),
        "[a-zA-Z ?!.]{1,40}",
    ]
}

fn arb_input() -> impl Strategy<Value = Input> {
    prop_oneof![
        arb_button().prop_map(Input::Button),
        arb_text().prop_map(Input::Text),
    ]
}

fn check_response(response: &ChatResponse) -> Result<(), TestCaseError> {
    prop_assert!(!response.reply_text.trim().is_empty(), "empty reply at {:?}", response.stage);
    prop_assert!(Stage::ALL.contains(&response.stage));
    prop_assert!(response.persisted);
    prop_assert!(response.buttons.iter().all(|b| !b.token.is_empty()));
    prop_assert_eq!(response.conversation_ended, response.stage == Stage::Ended);
    Ok(())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_reply_never_empty(inputs in proptest::collection::vec(arb_input(), 1..30)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let h = TestHarness::new(DiagnosticEngine::rules_only());
            check_response(&h.controller.greet("prop").await)?;

            for input in &inputs {
                let response = match input {
                    Input::Button(token) => h.button("prop", token).await,
                    Input::Text(text) => h.text("prop", text).await,
                };
                check_response(&response)?;

                let session = h.session("prop");
                prop_assert_eq!(session.stage(), response.stage);
                prop_assert!(session.diagnostics.len() <= crate::session::MAX_STEPS);
            }

            let session = h.session("prop");
            prop_assert_eq!(session.transcript().len(), inputs.len() + 1);
            for pair in session.transcript().windows(2) {
                prop_assert_eq!(pair[0].stage_after, pair[1].stage_before);
            }
            prop_assert!(h.store.ticket_count() <= 1);
            Ok::<(), TestCaseError>(())
        })?;
    }
}

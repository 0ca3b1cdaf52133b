//! Property-based tests for the stage machine
//!
//! Random walks over the transition table must keep every session inside the
//! closed stage set with a coherent return slot.

use super::*;
use crate::session::Session;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_stage() -> impl Strategy<Value = Stage> {
    proptest::sample::select(Stage::ALL.to_vec())
}

fn session_at(stage: Stage, return_stage: Option<Stage>) -> Session {
    let mut session = Session::new("prop-conv", Stage::LanguageSelect);
    session.apply_transition(stage, return_stage);
    session
}

/// Auxiliary stages always remember a main-flow stage; main-flow stages never do
fn return_slot_is_coherent(session: &Session) -> bool {
    match session.return_stage() {
        Some(saved) => session.stage().is_auxiliary() && !saved.is_auxiliary(),
        None => !session.stage().is_auxiliary(),
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_random_walk_stays_closed(targets in proptest::collection::vec(arb_stage(), 0..40)) {
        let mut session = Session::new("prop-conv", Stage::LanguageSelect);

        for target in targets {
            let before = session.clone();
            match attempt_transition(&mut session, target) {
                Ok(()) => {
                    prop_assert_eq!(session.stage(), target);
                    prop_assert!(can_transition(before.stage(), target, before.return_stage()));
                }
                Err(_) => {
                    prop_assert_eq!(&session, &before, "rejection must not mutate");
                }
            }
            prop_assert!(Stage::ALL.contains(&session.stage()));
            prop_assert!(return_slot_is_coherent(&session), "bad slot: {:?}", session);
        }
    }

    #[test]
    fn prop_end_only_after_feedback_or_ticket(from in arb_stage(), saved in arb_stage()) {
        let return_stage = (from.is_auxiliary() && !saved.is_auxiliary()).then_some(saved);
        let mut session = session_at(from, return_stage);

        if attempt_transition(&mut session, Stage::Ended).is_ok() {
            let via = if from.is_auxiliary() { saved } else { from };
            prop_assert!(
                matches!(via, Stage::Feedback | Stage::TicketCreated | Stage::Ended),
                "reached Ended from {:?}",
                from
            );
        }
    }

    #[test]
    fn prop_detour_returns_home(home in arb_stage(), aux in prop_oneof![Just(Stage::FreeQa), Just(Stage::Deescalation)]) {
        prop_assume!(home.allows_detour());
        let mut session = session_at(home, None);

        attempt_transition(&mut session, aux).unwrap();
        prop_assert_eq!(session.return_stage(), Some(home));

        for other in Stage::ALL {
            if other != aux && other != home {
                prop_assert!(!can_transition(aux, other, Some(home)));
            }
        }

        attempt_transition(&mut session, home).unwrap();
        prop_assert_eq!(session.stage(), home);
        prop_assert_eq!(session.return_stage(), None);
    }

    #[test]
    fn prop_self_loop_always_allowed(stage in arb_stage(), saved in arb_stage()) {
        let return_stage = (stage.is_auxiliary() && !saved.is_auxiliary()).then_some(saved);
        prop_assert!(can_transition(stage, stage, return_stage));
    }
}

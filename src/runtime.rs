//! Dialogue runtime
//!
//! The orchestrator drives one turn; the controller makes sure turns of the
//! same conversation never overlap. Everything external goes through the
//! traits in [`traits`].

mod controller;
mod handlers;
mod orchestrator;
pub mod traits;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub mod testing;

pub use controller::{ConcurrencyController, LockSettings};
pub use orchestrator::Orchestrator;
pub use traits::*;

/// Controller over the SQLite-backed store
pub type ProductionController = ConcurrencyController<DatabaseStorage>;

#[cfg(test)]
mod tests {
    use super::testing::{DelayedMockLlmClient, MockLlmClient, RecordingDelivery, TestHarness};
    use crate::contract::{ChatResponse, InboundEvent};
    use crate::diagnostics::DiagnosticEngine;
    use crate::escalation::EscalationReason;
    use crate::llm::LlmResponse;
    use crate::messages::Msg;
    use crate::normalizer::{
        BTN_BACK, BTN_END, BTN_HELP, BTN_LANG_EN, BTN_LANG_ES_AR, BTN_NO_NAME, BTN_PERSIST,
        BTN_RESTART, BTN_SKIP_CONTACT, BTN_SOLVED, BTN_YES,
    };
    use crate::session::{is_duplicate_step, Locale, StepSource, MAX_STEPS};
    use crate::state_machine::Stage;
    use std::sync::Arc;
    use std::time::Duration;

    /// Language, name and need, then the problem text
    async fn start_problem(h: &TestHarness, conv: &str, lang: &str, problem: &str) -> ChatResponse {
        h.controller.greet(conv).await;
        h.button(conv, lang).await;
        h.text(conv, "Ana").await;
        h.button(conv, BTN_HELP).await;
        h.text(conv, problem).await
    }

    fn assert_step_buttons(response: &ChatResponse) {
        let tokens: Vec<&str> = response.buttons.iter().map(|b| b.token.as_str()).collect();
        assert_eq!(tokens.len(), 4, "buttons: {tokens:?}");
        assert_eq!(tokens[0], BTN_SOLVED);
        assert_eq!(tokens[1], BTN_PERSIST);
        assert!(tokens[2].starts_with("BTN_HELP_STEP_"));
        assert_eq!(tokens[3], BTN_BACK);
    }

    #[tokio::test]
    async fn test_first_step_carries_four_buttons() {
        let h = TestHarness::new(DiagnosticEngine::rules_only());
        let response = start_problem(&h, "c1", BTN_LANG_ES_AR, "mi compu no prende").await;
        assert_eq!(response.stage, Stage::DeviceSelect);

        let response = h.button("c1", "BTN_DEV_DESKTOP").await;
        assert_eq!(response.stage, Stage::DiagnosticLoop);
        assert!(response.reply_text.starts_with("Paso 1:"));
        assert_step_buttons(&response);
        assert_eq!(response.buttons[2].token, "BTN_HELP_STEP_1");
        assert!(!response.escalation_eligible);
    }

    #[tokio::test]
    async fn test_two_persist_presses_escalate_with_masked_ticket() {
        let h = TestHarness::new(DiagnosticEngine::rules_only());
        start_problem(
            &h,
            "c1",
            BTN_LANG_EN,
            "my notebook won't turn on, card 4111 1111 1111 1111 is on file",
        )
        .await;

        let first = h.button("c1", BTN_PERSIST).await;
        assert_eq!(first.stage, Stage::DiagnosticLoop);
        assert_step_buttons(&first);
        assert!(first.escalation_eligible);

        let second = h.button("c1", BTN_PERSIST).await;
        assert_eq!(second.stage, Stage::Escalation);
        let ticket_id = second.ticket_id.clone().unwrap();
        assert!(second.reply_text.contains(&ticket_id));

        let ticket = h.store.ticket("c1").unwrap();
        assert_eq!(ticket.id, ticket_id);
        assert_eq!(ticket.reason, EscalationReason::RepeatedFailure);
        let summary = ticket.summary();
        assert!(!summary.is_empty());
        assert!(summary.contains("[CARD]"));
        assert!(!summary.contains("4111 1111 1111 1111"));
        assert!(ticket.excerpt.iter().all(|line| !line.contains("4111")));
        assert_eq!(ticket.attempted_steps.len(), 2);
        assert!(ticket.context.problem.is_some());

        let done = h.button("c1", BTN_SKIP_CONTACT).await;
        assert_eq!(done.stage, Stage::TicketCreated);
        assert_eq!(done.ticket_id.as_deref(), Some(ticket_id.as_str()));
        assert_eq!(h.delivery.deliveries().len(), 1);
        assert_eq!(h.store.ticket_count(), 1);
    }

    #[tokio::test]
    async fn test_timeouts_never_block_and_ceiling_escalates() {
        let slow = Arc::new(DelayedMockLlmClient::new("slow", Duration::from_millis(200)));
        let engine = DiagnosticEngine::new(Some(slow.clone()), Duration::from_millis(20));
        let h = TestHarness::new(engine);

        let response = start_problem(&h, "c1", BTN_LANG_EN, "my router has no internet").await;
        assert_eq!(response.stage, Stage::DiagnosticLoop);

        // Alternate failures with "go back" so the failure run never reaches two
        while h.session("c1").diagnostics.len() < MAX_STEPS {
            let next = h.button("c1", BTN_PERSIST).await;
            assert_eq!(next.stage, Stage::DiagnosticLoop);
            assert_step_buttons(&next);
            let back = h.button("c1", BTN_BACK).await;
            assert_eq!(back.stage, Stage::DiagnosticLoop);
        }

        let session = h.session("c1");
        assert!(session
            .diagnostics
            .steps()
            .iter()
            .all(|s| s.source == StepSource::Fallback));
        let texts = session.diagnostics.issued_texts();
        for (i, a) in texts.iter().enumerate() {
            for b in &texts[i + 1..] {
                assert!(!is_duplicate_step(a, b), "{a} / {b}");
            }
        }

        let escalated = h.button("c1", BTN_PERSIST).await;
        assert_eq!(escalated.stage, Stage::Escalation);
        let ticket = h.store.ticket("c1").unwrap();
        assert_eq!(ticket.reason, EscalationReason::StepCeiling);
        assert_eq!(slow.request_count(), MAX_STEPS);
    }

    #[tokio::test]
    async fn test_duplicate_request_id_runs_once() {
        let mock = Arc::new(MockLlmClient::new("mock"));
        let engine = DiagnosticEngine::new(Some(mock.clone()), Duration::from_secs(1));
        let h = Arc::new(TestHarness::new(engine));
        start_problem(&h, "c1", BTN_LANG_EN, "no internet since yesterday").await;
        mock.queue_response(LlmResponse::from_text("Unplug the router for thirty seconds."));

        let event = InboundEvent::button("c1", "dup-1", "BTN_DEV_ROUTER");
        let a = {
            let h = Arc::clone(&h);
            let event = event.clone();
            tokio::spawn(async move { h.send(event).await })
        };
        let b = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.send(event).await })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert_eq!(a.stage, Stage::DiagnosticLoop);
        assert_eq!(mock.recorded_requests().len(), 1);

        let session = h.session("c1");
        let matching = session
            .transcript()
            .iter()
            .filter(|t| t.raw_input == "[button] BTN_DEV_ROUTER")
            .count();
        assert_eq!(matching, 1);
        assert_eq!(session.diagnostics.len(), 1);
    }

    #[tokio::test]
    async fn test_full_happy_path_to_restart() {
        let h = TestHarness::new(DiagnosticEngine::rules_only());
        let greeting = h.controller.greet("c1").await;
        assert_eq!(greeting.stage, Stage::LanguageSelect);
        assert_eq!(greeting.buttons.len(), 3);

        h.button("c1", BTN_LANG_EN).await;
        let need = h.button("c1", BTN_NO_NAME).await;
        assert_eq!(need.stage, Stage::NeedClassification);
        h.button("c1", BTN_HELP).await;
        let step = h.text("c1", "the printer won't print anything").await;
        assert_eq!(step.stage, Stage::DiagnosticLoop);

        let feedback = h.button("c1", BTN_SOLVED).await;
        assert_eq!(feedback.stage, Stage::Feedback);
        let ended = h.text("c1", "quick and clear, thanks").await;
        assert_eq!(ended.stage, Stage::Ended);
        assert!(ended.conversation_ended);

        let restarted = h.button("c1", BTN_RESTART).await;
        assert_eq!(restarted.stage, Stage::LanguageSelect);
        let session = h.session("c1");
        assert!(session.context.problem.is_none());
        assert!(session.diagnostics.is_empty());
        assert_eq!(session.context.locale, Locale::En);
        // greeting plus seven user turns
        assert_eq!(session.transcript().len(), 8);
    }

    #[tokio::test]
    async fn test_user_requested_escalation_with_contact() {
        let h = TestHarness::new(DiagnosticEngine::rules_only());
        start_problem(&h, "c1", BTN_LANG_EN, "my phone won't charge").await;
        h.button("c1", BTN_PERSIST).await;

        let escalation = h.button("c1", BTN_YES).await;
        assert_eq!(escalation.stage, Stage::Escalation);

        let created = h.text("c1", "ana@example.com or +54 11 4555 1234").await;
        assert_eq!(created.stage, Stage::TicketCreated);
        assert!(created
            .reply_text
            .starts_with(Msg::TicketDelivered.text(Locale::En)));

        let deliveries = h.delivery.deliveries();
        assert_eq!(deliveries.len(), 1);
        let (ticket, contact) = &deliveries[0];
        assert_eq!(ticket.reason, EscalationReason::UserRequested);
        assert_eq!(contact.as_deref(), Some("ana@example.com or +54 11 4555 1234"));
        assert!(!serde_json::to_string(ticket).unwrap().contains("ana@example.com"));

        let ended = h.button("c1", BTN_END).await;
        assert_eq!(ended.stage, Stage::Ended);
    }

    #[tokio::test]
    async fn test_failed_delivery_still_reports_ticket() {
        let h = TestHarness::builder(DiagnosticEngine::rules_only())
            .delivery(RecordingDelivery::failing())
            .build();
        start_problem(&h, "c1", BTN_LANG_EN, "talk to a technician please").await;
        let created = h.button("c1", BTN_SKIP_CONTACT).await;

        assert_eq!(created.stage, Stage::TicketCreated);
        assert!(created
            .reply_text
            .starts_with(Msg::TicketDeliveryFailed.text(Locale::En)));
        assert!(created
            .reply_text
            .contains(created.ticket_id.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn test_restart_keeps_single_ticket() {
        let h = TestHarness::new(DiagnosticEngine::rules_only());
        start_problem(&h, "c1", BTN_LANG_EN, "I want a human").await;
        let first = h.button("c1", BTN_SKIP_CONTACT).await;
        let ticket_id = first.ticket_id.clone().unwrap();
        h.button("c1", BTN_END).await;
        h.button("c1", BTN_RESTART).await;

        h.button("c1", BTN_LANG_EN).await;
        h.button("c1", BTN_NO_NAME).await;
        h.button("c1", BTN_HELP).await;
        let again = h.text("c1", "get me a technician").await;
        assert_eq!(again.stage, Stage::Escalation);
        assert_eq!(again.ticket_id.as_deref(), Some(ticket_id.as_str()));
        assert_eq!(h.store.ticket_count(), 1);
    }
}

//! Turn orchestration
//!
//! Runs one inbound event through load, normalize, stage handler, transition
//! check, side effects, transcript append and save. The caller must hold the
//! conversation's lock.

use super::handlers::{self, HandlerOutput, StageEffect};
use super::traits::{AuditEvent, AuditSink, ImageAnalyzer, Storage, StoreError, TicketDelivery};
use crate::contract::{Button, ChatResponse, InboundEvent};
use crate::db::{COUNTER_PERSIST_FAILURES, COUNTER_TICKETS_CREATED};
use crate::diagnostics::DiagnosticEngine;
use crate::escalation::{build_ticket, redact, EscalationReason, Ticket};
use crate::messages::{self, Msg};
use crate::normalizer::{self, language_buttons, NormalizedInput};
use crate::session::{ImageFinding, Locale, Session, Turn};
use crate::state_machine::{attempt_transition, Stage};
use chrono::Utc;
use std::sync::Arc;

pub struct Orchestrator<S: Storage> {
    store: S,
    engine: DiagnosticEngine,
    images: Option<Arc<dyn ImageAnalyzer>>,
    delivery: Arc<dyn TicketDelivery>,
    audit: Arc<dyn AuditSink>,
}

impl<S: Storage> Orchestrator<S> {
    pub fn new(
        store: S,
        engine: DiagnosticEngine,
        delivery: Arc<dyn TicketDelivery>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            engine,
            images: None,
            delivery,
            audit,
        }
    }

    pub fn with_image_analyzer(mut self, analyzer: Arc<dyn ImageAnalyzer>) -> Self {
        self.images = Some(analyzer);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn engine(&self) -> &DiagnosticEngine {
        &self.engine
    }

    async fn load_or_create(&self, conversation_id: &str) -> Result<Session, StoreError> {
        if let Some(session) = self.store.get(conversation_id).await? {
            return Ok(session);
        }
        tracing::info!(conv_id = %conversation_id, "Creating session");
        self.store.create(conversation_id, Stage::LanguageSelect).await
    }

    /// Opening message for a conversation. Creates the session if needed.
    pub async fn greet(&self, conversation_id: &str) -> ChatResponse {
        let mut session = match self.load_or_create(conversation_id).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(conv_id = %conversation_id, error = %e, "Session store unavailable");
                return unavailable(conversation_id, Locale::default());
            }
        };

        let (reply, buttons) = if session.stage() == Stage::LanguageSelect {
            (greeting_text(), language_buttons())
        } else {
            handlers::stage_prompt(&session)
        };

        session.append_turn(Turn::system(session.stage(), reply.clone(), buttons.clone()));
        self.audit.record(&AuditEvent {
            conversation_id: session.id.clone(),
            request_id: String::new(),
            stage_before: session.stage(),
            stage_after: session.stage(),
            input: "[start]".to_string(),
            buttons: tokens(&buttons),
            reply_chars: reply.chars().count(),
            ticket_id: session.ticket_id.clone(),
        });
        let persisted = self.persist(&mut session, false).await;
        respond(&session, reply, buttons, persisted)
    }

    /// Process one event. Replays return the cached response untouched.
    pub async fn process(&self, event: &InboundEvent) -> ChatResponse {
        let conversation_id = event.conversation_id.as_str();
        let original = match self.load_or_create(conversation_id).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(conv_id = %conversation_id, error = %e, "Session store unavailable");
                return unavailable(conversation_id, Locale::default());
            }
        };

        if let Some(cached) = original.cached_response(&event.request_id) {
            tracing::info!(
                conv_id = %conversation_id,
                request_id = %event.request_id,
                "Replaying processed request"
            );
            return cached.clone();
        }

        let finding = self.analyze_image(event).await;
        let input = normalizer::normalize(event, finding);
        let stage_before = original.stage();

        let mut working = original.clone();
        if let NormalizedInput::Image {
            finding: Some(finding),
            ..
        } = &input
        {
            working.context.image_findings.push(finding.clone());
            working.mark_dirty();
        }

        let output = handlers::dispatch(&mut working, &input, &self.engine).await;
        let HandlerOutput {
            next_stage,
            reply,
            buttons,
            effect,
        } = output;

        let (mut session, mut reply, buttons, effect) =
            match attempt_transition(&mut working, next_stage) {
                Ok(()) => (working, reply, buttons, effect),
                Err(e) => {
                    // The handler's changes are discarded along with the move
                    tracing::warn!(conv_id = %conversation_id, error = %e, "Handler target rejected");
                    let (prompt, buttons) = handlers::stage_prompt(&original);
                    (original.clone(), prompt, buttons, None)
                }
            };

        let mut checkpoint = false;
        match effect {
            Some(StageEffect::CreateTicket(reason)) => {
                let ticket_id = self.create_ticket(&mut session, reason).await;
                reply = format!(
                    "{reply}\n\n{}",
                    messages::ticket_line(session.context.locale, &ticket_id)
                );
            }
            Some(StageEffect::DeliverTicket) => {
                reply = self.deliver_ticket(&session, reply).await;
            }
            Some(StageEffect::Reset) => {
                session.reset_for_restart();
                checkpoint = true;
            }
            None => {}
        }

        if reply.trim().is_empty() {
            tracing::warn!(conv_id = %conversation_id, stage = %session.stage(), "Empty reply, substituting fallback");
            reply = Msg::EmptyReplyFallback.text(session.context.locale).to_string();
        }

        let raw_input = event.raw_input();
        session.append_turn(Turn::user(
            stage_before,
            session.stage(),
            raw_input.clone(),
            reply.clone(),
            buttons.clone(),
        ));
        self.audit.record(&AuditEvent {
            conversation_id: session.id.clone(),
            request_id: event.request_id.clone(),
            stage_before,
            stage_after: session.stage(),
            input: redact::mask(&raw_input),
            buttons: tokens(&buttons),
            reply_chars: reply.chars().count(),
            ticket_id: session.ticket_id.clone(),
        });

        let response = respond(&session, reply, buttons, true);
        session.remember_response(&event.request_id, response.clone());

        if self.persist(&mut session, checkpoint).await {
            response
        } else {
            ChatResponse {
                persisted: false,
                ..response
            }
        }
    }

    /// Bounded image analysis; failure just means no finding
    async fn analyze_image(&self, event: &InboundEvent) -> Option<ImageFinding> {
        let reference = event.image_reference.as_deref()?.trim();
        if reference.is_empty() || event.button_token.is_some() {
            return None;
        }
        let analyzer = self.images.as_ref()?;
        self.engine
            .bounded()
            .run("image_analysis", analyzer.analyze(reference))
            .await
            .ok()
    }

    /// Build and store the conversation's ticket, reusing an existing one.
    ///
    /// Returns the id that was shown to the user. A store failure is logged;
    /// the ticket is stored again at delivery time.
    async fn create_ticket(&self, session: &mut Session, reason: EscalationReason) -> String {
        if let Some(existing) = &session.ticket_id {
            tracing::info!(conv_id = %session.id, ticket_id = %existing, "Reusing existing ticket");
            return existing.clone();
        }

        let ticket = build_ticket(session, reason, Utc::now());
        let stored = match self.store.store_ticket(&ticket).await {
            Ok(stored) => {
                tracing::info!(
                    conv_id = %session.id,
                    ticket_id = %stored.id,
                    reason = reason.as_str(),
                    steps = stored.attempted_steps.len(),
                    "Ticket created"
                );
                self.bump(COUNTER_TICKETS_CREATED).await;
                stored
            }
            Err(e) => {
                tracing::error!(
                    conv_id = %session.id,
                    ticket_id = %ticket.id,
                    error = %e,
                    alert = "ticket_store_failed",
                    "Failed to store ticket"
                );
                ticket
            }
        };
        session.ticket_id = Some(stored.id.clone());
        stored.id
    }

    async fn ticket_for_delivery(&self, session: &Session) -> Option<Ticket> {
        match self.store.ticket_for(&session.id).await {
            Ok(Some(ticket)) => return Some(ticket),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(conv_id = %session.id, error = %e, "Ticket lookup failed");
            }
        }
        // Creation failed to store earlier; try again under the same id
        let mut ticket = build_ticket(session, EscalationReason::UserRequested, Utc::now());
        if let Some(id) = &session.ticket_id {
            ticket.id.clone_from(id);
        }
        match self.store.store_ticket(&ticket).await {
            Ok(stored) => Some(stored),
            Err(e) => {
                tracing::error!(conv_id = %session.id, error = %e, alert = "ticket_store_failed", "Failed to store ticket");
                None
            }
        }
    }

    /// Hand the ticket to the delivery channel, once, bounded.
    async fn deliver_ticket(&self, session: &Session, reply: String) -> String {
        let locale = session.context.locale;
        let Some(ticket) = self.ticket_for_delivery(session).await else {
            return Msg::TicketDeliveryFailed.text(locale).to_string();
        };
        let id_line = messages::ticket_line(locale, &ticket.id);

        let result = self
            .engine
            .bounded()
            .run(
                "ticket_delivery",
                self.delivery
                    .deliver(&ticket, session.context.contact.as_deref()),
            )
            .await;

        match result {
            Ok(receipt) => {
                tracing::info!(conv_id = %session.id, ticket_id = %ticket.id, "Ticket delivered");
                let mut text = format!("{reply}\n\n{id_line}");
                if let Some(link) = receipt.link {
                    text.push('\n');
                    text.push_str(&link);
                }
                text
            }
            Err(e) => {
                tracing::error!(
                    conv_id = %session.id,
                    ticket_id = %ticket.id,
                    error = %e,
                    alert = "ticket_delivery_failed",
                    "Ticket delivery failed"
                );
                format!("{}\n\n{id_line}", Msg::TicketDeliveryFailed.text(locale))
            }
        }
    }

    /// Save when dirty, or always at a checkpoint. One retry.
    ///
    /// Returns false when both attempts failed; the conversation carries on
    /// and the failure is logged and counted.
    async fn persist(&self, session: &mut Session, checkpoint: bool) -> bool {
        if !checkpoint && !session.is_dirty() {
            return true;
        }
        let mut last_error = None;
        for attempt in 1..=2 {
            match self.store.save(session).await {
                Ok(()) => {
                    session.mark_clean();
                    return true;
                }
                Err(e) => {
                    tracing::warn!(conv_id = %session.id, attempt, error = %e, "Session save failed");
                    last_error = Some(e);
                }
            }
        }
        tracing::error!(
            conv_id = %session.id,
            stage = %session.stage(),
            error = ?last_error.map(|e| e.to_string()),
            alert = "session_persist_failed",
            "Session could not be persisted"
        );
        self.bump(COUNTER_PERSIST_FAILURES).await;
        false
    }

    pub(crate) async fn bump(&self, counter: &str) {
        self.bump_by(counter, 1).await;
    }

    pub(crate) async fn bump_by(&self, counter: &str, by: i64) {
        if let Err(e) = self.store.increment(counter, by).await {
            tracing::warn!(counter, by, error = %e, "Counter update failed");
        }
    }
}

fn tokens(buttons: &[Button]) -> Vec<String> {
    buttons.iter().map(|b| b.token.clone()).collect()
}

/// Greeting shown before a language is chosen
fn greeting_text() -> String {
    format!(
        "{}\n\n{}",
        Msg::Greeting.text(Locale::EsAr),
        Msg::Greeting.text(Locale::En)
    )
}

fn respond(session: &Session, reply: String, buttons: Vec<Button>, persisted: bool) -> ChatResponse {
    ChatResponse {
        conversation_id: session.id.clone(),
        reply_text: reply,
        stage: session.stage(),
        buttons,
        escalation_eligible: session.escalation_eligible,
        conversation_ended: session.stage().is_terminal(),
        persisted,
        ticket_id: session.ticket_id.clone(),
    }
}

/// Reply when the session could not even be loaded
pub(crate) fn unavailable(conversation_id: &str, locale: Locale) -> ChatResponse {
    ChatResponse {
        conversation_id: conversation_id.to_string(),
        reply_text: Msg::EmptyReplyFallback.text(locale).to_string(),
        stage: Stage::LanguageSelect,
        buttons: Vec::new(),
        escalation_eligible: false,
        conversation_ended: false,
        persisted: false,
        ticket_id: None,
    }
}

/// Reply for a request that could not get the conversation lock in time
pub(crate) fn busy(session: Option<&Session>, conversation_id: &str) -> ChatResponse {
    let locale = session.map(|s| s.context.locale).unwrap_or_default();
    ChatResponse {
        conversation_id: conversation_id.to_string(),
        reply_text: Msg::Busy.text(locale).to_string(),
        stage: session.map_or(Stage::LanguageSelect, Session::stage),
        buttons: Vec::new(),
        escalation_eligible: session.is_some_and(|s| s.escalation_eligible),
        conversation_ended: session.is_some_and(|s| s.stage().is_terminal()),
        persisted: true,
        ticket_id: session.and_then(|s| s.ticket_id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::{BTN_HELP, BTN_LANG_EN, BTN_NO_NAME, BTN_RESUME};
    use crate::runtime::testing::{
        InMemoryStorage, RecordingAuditSink, RecordingDelivery, StaticImageAnalyzer,
    };
    use crate::runtime::traits::SessionStore;
    use crate::session::DeviceKind;
    use std::time::Duration;

    struct Fixture {
        store: Arc<InMemoryStorage>,
        audit: Arc<RecordingAuditSink>,
        orchestrator: Orchestrator<Arc<InMemoryStorage>>,
    }

    fn fixture(engine: DiagnosticEngine) -> Fixture {
        let store = Arc::new(InMemoryStorage::new());
        let audit = Arc::new(RecordingAuditSink::default());
        let orchestrator = Orchestrator::new(
            store.clone(),
            engine,
            Arc::new(RecordingDelivery::default()),
            audit.clone(),
        );
        Fixture {
            store,
            audit,
            orchestrator,
        }
    }

    /// Walk a fresh conversation up to the problem question
    async fn to_problem_capture(o: &Orchestrator<Arc<InMemoryStorage>>, conv: &str) {
        o.process(&InboundEvent::button(conv, "r1", BTN_LANG_EN)).await;
        o.process(&InboundEvent::button(conv, "r2", BTN_NO_NAME)).await;
        let response = o.process(&InboundEvent::button(conv, "r3", BTN_HELP)).await;
        assert_eq!(response.stage, Stage::ProblemCapture);
    }

    #[tokio::test]
    async fn test_greet_creates_session_with_system_turn() {
        let f = fixture(DiagnosticEngine::rules_only());
        let response = f.orchestrator.greet("c1").await;

        assert_eq!(response.stage, Stage::LanguageSelect);
        assert_eq!(response.buttons.len(), 3);
        assert!(response.persisted);
        let session = f.store.session("c1").unwrap();
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].actor, crate::session::Actor::System);
    }

    #[tokio::test]
    async fn test_replay_returns_cached_response() {
        let f = fixture(DiagnosticEngine::rules_only());
        let event = InboundEvent::button("c1", "same", BTN_LANG_EN);
        let first = f.orchestrator.process(&event).await;
        let second = f.orchestrator.process(&event).await;

        assert_eq!(first, second);
        assert_eq!(f.store.session("c1").unwrap().transcript().len(), 1);
        assert_eq!(f.audit.events().len(), 1);
    }

    #[tokio::test]
    async fn test_persist_failure_is_reported_and_counted() {
        let f = fixture(DiagnosticEngine::rules_only());
        f.orchestrator.greet("c1").await;
        f.store.fail_next_saves(2);

        let response = f
            .orchestrator
            .process(&InboundEvent::button("c1", "r1", BTN_LANG_EN))
            .await;
        assert!(!response.persisted);
        assert_eq!(response.stage, Stage::NameCapture);
        assert!(!response.reply_text.is_empty());
        assert_eq!(f.store.counter(COUNTER_PERSIST_FAILURES), 1);

        // One failure followed by a success is not reported
        f.store.fail_next_saves(1);
        let response = f
            .orchestrator
            .process(&InboundEvent::button("c1", "r2", BTN_LANG_EN))
            .await;
        assert!(response.persisted);
        assert_eq!(f.store.counter(COUNTER_PERSIST_FAILURES), 1);
    }

    #[tokio::test]
    async fn test_rejected_transition_keeps_stage() {
        let f = fixture(DiagnosticEngine::rules_only());
        let mut session = Session::new("c1", Stage::LanguageSelect);
        session.apply_transition(Stage::FreeQa, None);
        f.store.save(&session).await.unwrap();

        let response = f
            .orchestrator
            .process(&InboundEvent::button("c1", "r1", BTN_RESUME))
            .await;

        assert_eq!(response.stage, Stage::FreeQa);
        assert!(!response.reply_text.is_empty());
        let stored = f.store.session("c1").unwrap();
        let turn = stored.transcript().last().unwrap();
        assert_eq!(turn.stage_before, Stage::FreeQa);
        assert_eq!(turn.stage_after, Stage::FreeQa);
    }

    #[tokio::test]
    async fn test_image_finding_feeds_problem_capture() {
        let store = Arc::new(InMemoryStorage::new());
        let orchestrator = Orchestrator::new(
            store.clone(),
            DiagnosticEngine::rules_only(),
            Arc::new(RecordingDelivery::default()),
            Arc::new(RecordingAuditSink::default()),
        )
        .with_image_analyzer(Arc::new(StaticImageAnalyzer::new(ImageFinding {
            reference: String::new(),
            device_hint: Some("router".to_string()),
            error_text: Some("No internet access".to_string()),
            summary: None,
        })));
        to_problem_capture(&orchestrator, "c1").await;

        let response = orchestrator
            .process(&InboundEvent::image("c1", "r4", "img-1.png"))
            .await;
        assert_eq!(response.stage, Stage::DiagnosticLoop);
        assert_eq!(response.buttons.len(), 4);

        let session = store.session("c1").unwrap();
        assert_eq!(session.context.device, Some(DeviceKind::Router));
        assert_eq!(session.context.image_findings.len(), 1);
        assert_eq!(session.context.image_findings[0].reference, "img-1.png");
    }

    #[tokio::test]
    async fn test_slow_image_analysis_is_abandoned() {
        let store = Arc::new(InMemoryStorage::new());
        let orchestrator = Orchestrator::new(
            store.clone(),
            DiagnosticEngine::new(None, Duration::from_millis(50)),
            Arc::new(RecordingDelivery::default()),
            Arc::new(RecordingAuditSink::default()),
        )
        .with_image_analyzer(Arc::new(
            StaticImageAnalyzer::new(ImageFinding::default()).with_delay(Duration::from_millis(300)),
        ));
        to_problem_capture(&orchestrator, "c1").await;

        let response = orchestrator
            .process(&InboundEvent::image("c1", "r4", "img-1.png"))
            .await;
        assert_eq!(response.stage, Stage::ProblemCapture);
        assert!(response
            .reply_text
            .starts_with(Msg::ImageReceived.text(Locale::En)));
        assert!(store.session("c1").unwrap().context.image_findings.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_text_is_recorded_capped() {
        let f = fixture(DiagnosticEngine::rules_only());
        to_problem_capture(&f.orchestrator, "c1").await;
        let flood = "my printer jams ".repeat(20_000);
        f.orchestrator
            .process(&InboundEvent::text("c1", "r4", flood))
            .await;

        let session = f.store.session("c1").unwrap();
        let turn = session.transcript().last().unwrap();
        assert_eq!(turn.raw_input.chars().count(), crate::normalizer::MAX_TEXT_CHARS);
        let event = f.audit.events().pop().unwrap();
        assert!(event.input.chars().count() <= crate::normalizer::MAX_TEXT_CHARS);
    }

    #[tokio::test]
    async fn test_audit_masks_input() {
        let f = fixture(DiagnosticEngine::rules_only());
        to_problem_capture(&f.orchestrator, "c1").await;
        f.orchestrator
            .process(&InboundEvent::text(
                "c1",
                "r4",
                "my printer fails, write me at ana@example.com",
            ))
            .await;

        let events = f.audit.events();
        let last = events.last().unwrap();
        assert_eq!(last.stage_before, Stage::ProblemCapture);
        assert!(last.input.contains("[EMAIL]"));
        assert!(!last.input.contains("ana@example.com"));
    }
}

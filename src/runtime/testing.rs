//! Mock implementations for testing
//!
//! These mocks let the full dialogue run without real I/O.

use super::controller::{ConcurrencyController, LockSettings};
use super::orchestrator::Orchestrator;
use super::traits::*;
use crate::contract::{ChatResponse, InboundEvent};
use crate::diagnostics::DiagnosticEngine;
use crate::escalation::Ticket;
use crate::llm::{LlmError, LlmRequest, LlmResponse};
use crate::session::{ImageFinding, Session};
use crate::state_machine::Stage;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
#[allow(dead_code)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

#[allow(dead_code)]
impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Delayed Mock LLM Client (for timeout and serialization testing)
// ============================================================================

/// Mock LLM client with a fixed delay before every answer
pub struct DelayedMockLlmClient {
    inner: MockLlmClient,
    delay: Duration,
    in_flight: AtomicUsize,
    /// Highest number of calls observed running at the same time
    max_in_flight: AtomicUsize,
}

#[allow(dead_code)]
impl DelayedMockLlmClient {
    pub fn new(model_id: impl Into<String>, delay: Duration) -> Self {
        Self {
            inner: MockLlmClient::new(model_id),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.inner.queue_response(response);
    }

    pub fn request_count(&self) -> usize {
        self.inner.requests.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight count even when the call is abandoned
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LlmClient for DelayedMockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.inner.requests.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        tokio::time::sleep(self.delay).await;
        self.inner
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

// ============================================================================
// In-Memory Storage
// ============================================================================

/// In-memory storage for testing
#[allow(dead_code)]
#[derive(Default)]
pub struct InMemoryStorage {
    sessions: Mutex<HashMap<String, Session>>,
    tickets: Mutex<HashMap<String, Ticket>>,
    locks: Mutex<HashMap<String, (String, Instant)>>,
    counters: Mutex<HashMap<String, i64>>,
    /// Number of upcoming saves that fail
    failing_saves: AtomicUsize,
    save_calls: AtomicUsize,
    increment_calls: AtomicUsize,
}

#[allow(dead_code)]
impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` saves fail
    pub fn fail_next_saves(&self, n: usize) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn session(&self, conversation_id: &str) -> Option<Session> {
        self.sessions.lock().unwrap().get(conversation_id).cloned()
    }

    pub fn ticket(&self, conversation_id: &str) -> Option<Ticket> {
        self.tickets.lock().unwrap().get(conversation_id).cloned()
    }

    pub fn ticket_count(&self) -> usize {
        self.tickets.lock().unwrap().len()
    }

    /// Store round-trips spent on counters
    pub fn increment_calls(&self) -> usize {
        self.increment_calls.load(Ordering::SeqCst)
    }

    pub fn counter(&self, name: &str) -> i64 {
        self.counters.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    /// Plant a lease held by someone else
    pub fn hold_lock(&self, conversation_id: &str, owner_id: &str, ttl: Duration) {
        self.locks.lock().unwrap().insert(
            conversation_id.to_string(),
            (owner_id.to_string(), Instant::now() + ttl),
        );
    }

    pub fn lock_owner(&self, conversation_id: &str) -> Option<String> {
        self.locks
            .lock()
            .unwrap()
            .get(conversation_id)
            .map(|(owner, _)| owner.clone())
    }
}

#[async_trait]
impl SessionStore for InMemoryStorage {
    async fn get(&self, conversation_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.session(conversation_id))
    }

    async fn create(&self, conversation_id: &str, initial: Stage) -> Result<Session, StoreError> {
        let mut session = Session::new(conversation_id, initial);
        session.mark_clean();
        self.sessions
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), session.clone());
        Ok(session)
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(StoreError::Unavailable("injected save failure".to_string()));
        }
        let mut stored = session.clone();
        stored.mark_clean();
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), stored);
        Ok(())
    }
}

#[async_trait]
impl TicketStore for InMemoryStorage {
    async fn store_ticket(&self, ticket: &Ticket) -> Result<Ticket, StoreError> {
        let mut tickets = self.tickets.lock().unwrap();
        Ok(tickets
            .entry(ticket.conversation_id.clone())
            .or_insert_with(|| ticket.clone())
            .clone())
    }

    async fn ticket_for(&self, conversation_id: &str) -> Result<Option<Ticket>, StoreError> {
        Ok(self.ticket(conversation_id))
    }
}

#[async_trait]
impl LockStore for InMemoryStorage {
    async fn try_acquire(
        &self,
        conversation_id: &str,
        owner_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut locks = self.locks.lock().unwrap();
        match locks.get(conversation_id) {
            Some((owner, expires)) if owner != owner_id && *expires > now => Ok(false),
            _ => {
                locks.insert(
                    conversation_id.to_string(),
                    (owner_id.to_string(), now + ttl),
                );
                Ok(true)
            }
        }
    }

    async fn release(&self, conversation_id: &str, owner_id: &str) -> Result<(), StoreError> {
        let mut locks = self.locks.lock().unwrap();
        if locks
            .get(conversation_id)
            .is_some_and(|(owner, _)| owner == owner_id)
        {
            locks.remove(conversation_id);
        }
        Ok(())
    }

    async fn reclaim_stale(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut locks = self.locks.lock().unwrap();
        let before = locks.len();
        locks.retain(|_, (_, expires)| *expires > now);
        Ok(before - locks.len())
    }
}

#[async_trait]
impl Counters for InMemoryStorage {
    async fn increment(&self, name: &str, by: i64) -> Result<i64, StoreError> {
        self.increment_calls.fetch_add(1, Ordering::SeqCst);
        let mut counters = self.counters.lock().unwrap();
        let value = counters.entry(name.to_string()).or_insert(0);
        *value += by;
        Ok(*value)
    }
}

// ============================================================================
// Collaborator mocks
// ============================================================================

/// Delivery channel that records every hand-off
#[derive(Default)]
pub struct RecordingDelivery {
    deliveries: Mutex<Vec<(Ticket, Option<String>)>>,
    fail: bool,
}

#[allow(dead_code)]
impl RecordingDelivery {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn deliveries(&self) -> Vec<(Ticket, Option<String>)> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl TicketDelivery for RecordingDelivery {
    async fn deliver(
        &self,
        ticket: &Ticket,
        contact: Option<&str>,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        self.deliveries
            .lock()
            .unwrap()
            .push((ticket.clone(), contact.map(str::to_string)));
        if self.fail {
            return Err(DeliveryError("channel down".to_string()));
        }
        Ok(DeliveryReceipt {
            link: Some(format!("https://support.test/{}", ticket.id)),
        })
    }
}

#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

#[allow(dead_code)]
impl RecordingAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Image analyzer answering with a fixed finding after an optional delay
pub struct StaticImageAnalyzer {
    finding: Option<ImageFinding>,
    delay: Duration,
}

#[allow(dead_code)]
impl StaticImageAnalyzer {
    pub fn new(finding: ImageFinding) -> Self {
        Self {
            finding: Some(finding),
            delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self {
            finding: None,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ImageAnalyzer for StaticImageAnalyzer {
    async fn analyze(&self, reference: &str) -> Result<ImageFinding, AnalysisError> {
        tokio::time::sleep(self.delay).await;
        match &self.finding {
            Some(finding) => Ok(ImageFinding {
                reference: reference.to_string(),
                ..finding.clone()
            }),
            None => Err(AnalysisError("unreadable image".to_string())),
        }
    }
}

// ============================================================================
// Test harness
// ============================================================================

/// Controller wired to in-memory mocks
#[allow(dead_code)]
pub struct TestHarness {
    pub store: Arc<InMemoryStorage>,
    pub delivery: Arc<RecordingDelivery>,
    pub audit: Arc<RecordingAuditSink>,
    pub controller: Arc<ConcurrencyController<Arc<InMemoryStorage>>>,
    next_request: AtomicUsize,
}

#[allow(dead_code)]
impl TestHarness {
    pub fn new(engine: DiagnosticEngine) -> Self {
        Self::builder(engine).build()
    }

    pub fn builder(engine: DiagnosticEngine) -> TestHarnessBuilder {
        TestHarnessBuilder {
            engine,
            store: Arc::new(InMemoryStorage::new()),
            delivery: Arc::new(RecordingDelivery::default()),
            images: None,
            settings: LockSettings {
                ttl: Duration::from_secs(30),
                wait: Duration::from_secs(2),
            },
        }
    }

    pub async fn send(&self, event: InboundEvent) -> ChatResponse {
        self.controller.handle(event).await
    }

    fn request_id(&self) -> String {
        format!("req-{}", self.next_request.fetch_add(1, Ordering::SeqCst))
    }

    pub async fn text(&self, conversation_id: &str, text: &str) -> ChatResponse {
        let request_id = self.request_id();
        self.send(InboundEvent::text(conversation_id, request_id, text))
            .await
    }

    pub async fn button(&self, conversation_id: &str, token: &str) -> ChatResponse {
        let request_id = self.request_id();
        self.send(InboundEvent::button(conversation_id, request_id, token))
            .await
    }

    pub fn session(&self, conversation_id: &str) -> Session {
        self.store
            .session(conversation_id)
            .expect("session should exist")
    }
}

pub struct TestHarnessBuilder {
    engine: DiagnosticEngine,
    store: Arc<InMemoryStorage>,
    delivery: Arc<RecordingDelivery>,
    images: Option<Arc<dyn ImageAnalyzer>>,
    settings: LockSettings,
}

#[allow(dead_code)]
impl TestHarnessBuilder {
    /// Share a store with another harness, as two instances would
    pub fn store(mut self, store: Arc<InMemoryStorage>) -> Self {
        self.store = store;
        self
    }

    pub fn delivery(mut self, delivery: RecordingDelivery) -> Self {
        self.delivery = Arc::new(delivery);
        self
    }

    pub fn images(mut self, analyzer: impl ImageAnalyzer + 'static) -> Self {
        self.images = Some(Arc::new(analyzer));
        self
    }

    pub fn lock_settings(mut self, settings: LockSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> TestHarness {
        let audit = Arc::new(RecordingAuditSink::default());
        let mut orchestrator = Orchestrator::new(
            self.store.clone(),
            self.engine,
            self.delivery.clone(),
            audit.clone(),
        );
        if let Some(images) = self.images {
            orchestrator = orchestrator.with_image_analyzer(images);
        }
        let controller = Arc::new(ConcurrencyController::new(
            Arc::new(orchestrator),
            self.settings,
        ));
        TestHarness {
            store: self.store,
            delivery: self.delivery,
            audit,
            controller,
            next_request: AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_llm_client() {
        let mock = MockLlmClient::new("test-model");
        mock.queue_response(LlmResponse::from_text("Hello"));

        let request = LlmRequest::prompt("system", "Hi");
        let response = mock.complete(&request).await.unwrap();
        assert_eq!(response.text, "Hello");
        assert_eq!(mock.recorded_requests().len(), 1);

        // Nothing queued: error
        assert!(mock.complete(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_in_memory_save_failure_injection() {
        let store = InMemoryStorage::new();
        let session = store.create("c1", Stage::LanguageSelect).await.unwrap();
        store.fail_next_saves(1);
        assert!(store.save(&session).await.is_err());
        assert!(store.save(&session).await.is_ok());
        assert_eq!(store.save_calls(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_lease_expiry() {
        let store = InMemoryStorage::new();
        store.hold_lock("c1", "other", Duration::from_millis(10));
        assert!(!store
            .try_acquire("c1", "me", Duration::from_secs(1))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.reclaim_stale().await.unwrap(), 1);
        assert!(store
            .try_acquire("c1", "me", Duration::from_secs(1))
            .await
            .unwrap());
    }
}

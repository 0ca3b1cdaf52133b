//! Trait abstractions for runtime I/O
//!
//! The orchestrator only talks to collaborators through these traits, so the
//! whole dialogue can be driven against in-memory mocks.

use crate::db::{DbError, Database};
use crate::escalation::Ticket;
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use crate::session::{ImageFinding, Session};
use crate::state_machine::Stage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[allow(dead_code)] // Raised by in-memory stores under fault injection
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
#[error("Image analysis failed: {0}")]
pub struct AnalysisError(pub String);

#[derive(Debug, Error)]
#[error("Ticket delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// What the delivery channel handed back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Hand-off link for the user, when the channel produces one
    pub link: Option<String>,
}

/// One structured record per processed turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub conversation_id: String,
    pub request_id: String,
    pub stage_before: Stage,
    pub stage_after: Stage,
    /// Raw input with personal data masked
    pub input: String,
    pub buttons: Vec<String>,
    pub reply_chars: usize,
    pub ticket_id: Option<String>,
}

/// Storage for sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, conversation_id: &str) -> Result<Option<Session>, StoreError>;

    /// Create and persist a fresh session at `initial`
    async fn create(&self, conversation_id: &str, initial: Stage) -> Result<Session, StoreError>;

    async fn save(&self, session: &Session) -> Result<(), StoreError>;
}

/// Storage for escalation tickets
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Store `ticket` unless the conversation already has one; returns the
    /// ticket that is actually on record
    async fn store_ticket(&self, ticket: &Ticket) -> Result<Ticket, StoreError>;

    async fn ticket_for(&self, conversation_id: &str) -> Result<Option<Ticket>, StoreError>;
}

/// Durable per-conversation leases, shared across instances
#[async_trait]
pub trait LockStore: Send + Sync {
    async fn try_acquire(
        &self,
        conversation_id: &str,
        owner_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    async fn release(&self, conversation_id: &str, owner_id: &str) -> Result<(), StoreError>;

    /// Drop leases whose expiry has passed; returns how many
    async fn reclaim_stale(&self) -> Result<usize, StoreError>;
}

/// Named operational counters
#[async_trait]
pub trait Counters: Send + Sync {
    /// Atomically add `by`; returns the new value
    async fn increment(&self, name: &str, by: i64) -> Result<i64, StoreError>;
}

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    fn model_id(&self) -> &str;
}

/// Out-of-band image analysis
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, reference: &str) -> Result<ImageFinding, AnalysisError>;
}

/// Hands a ticket to the human support channel
#[async_trait]
pub trait TicketDelivery: Send + Sync {
    async fn deliver(
        &self,
        ticket: &Ticket,
        contact: Option<&str>,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Receives one event per turn; must not block
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Combined storage trait for convenience
pub trait Storage: SessionStore + TicketStore + LockStore + Counters {}
impl<T: SessionStore + TicketStore + LockStore + Counters> Storage for T {}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn get(&self, conversation_id: &str) -> Result<Option<Session>, StoreError> {
        (**self).get(conversation_id).await
    }

    async fn create(&self, conversation_id: &str, initial: Stage) -> Result<Session, StoreError> {
        (**self).create(conversation_id, initial).await
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        (**self).save(session).await
    }
}

#[async_trait]
impl<T: TicketStore + ?Sized> TicketStore for Arc<T> {
    async fn store_ticket(&self, ticket: &Ticket) -> Result<Ticket, StoreError> {
        (**self).store_ticket(ticket).await
    }

    async fn ticket_for(&self, conversation_id: &str) -> Result<Option<Ticket>, StoreError> {
        (**self).ticket_for(conversation_id).await
    }
}

#[async_trait]
impl<T: LockStore + ?Sized> LockStore for Arc<T> {
    async fn try_acquire(
        &self,
        conversation_id: &str,
        owner_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        (**self).try_acquire(conversation_id, owner_id, ttl).await
    }

    async fn release(&self, conversation_id: &str, owner_id: &str) -> Result<(), StoreError> {
        (**self).release(conversation_id, owner_id).await
    }

    async fn reclaim_stale(&self) -> Result<usize, StoreError> {
        (**self).reclaim_stale().await
    }
}

#[async_trait]
impl<T: Counters + ?Sized> Counters for Arc<T> {
    async fn increment(&self, name: &str, by: i64) -> Result<i64, StoreError> {
        (**self).increment(name, by).await
    }
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Adapter to use Database as Storage
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for DatabaseStorage {
    async fn get(&self, conversation_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.db.get_session(conversation_id)?)
    }

    async fn create(&self, conversation_id: &str, initial: Stage) -> Result<Session, StoreError> {
        let mut session = Session::new(conversation_id, initial);
        self.db.upsert_session(&session)?;
        session.mark_clean();
        Ok(session)
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        Ok(self.db.upsert_session(session)?)
    }
}

#[async_trait]
impl TicketStore for DatabaseStorage {
    async fn store_ticket(&self, ticket: &Ticket) -> Result<Ticket, StoreError> {
        Ok(self.db.insert_ticket(ticket)?)
    }

    async fn ticket_for(&self, conversation_id: &str) -> Result<Option<Ticket>, StoreError> {
        Ok(self.db.get_ticket_for_conversation(conversation_id)?)
    }
}

#[async_trait]
impl LockStore for DatabaseStorage {
    async fn try_acquire(
        &self,
        conversation_id: &str,
        owner_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Ok(self
            .db
            .try_acquire_lock(conversation_id, owner_id, now_ms(), ttl_ms)?)
    }

    async fn release(&self, conversation_id: &str, owner_id: &str) -> Result<(), StoreError> {
        Ok(self.db.release_lock(conversation_id, owner_id)?)
    }

    async fn reclaim_stale(&self) -> Result<usize, StoreError> {
        Ok(self.db.reclaim_stale_locks(now_ms())?)
    }
}

#[async_trait]
impl Counters for DatabaseStorage {
    async fn increment(&self, name: &str, by: i64) -> Result<i64, StoreError> {
        Ok(self.db.increment_counter(name, by)?)
    }
}

/// Adapter to use an [`LlmService`] as LlmClient
pub struct ServiceLlmClient {
    service: Arc<dyn LlmService>,
}

impl ServiceLlmClient {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl LlmClient for ServiceLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.service.complete(request).await
    }

    fn model_id(&self) -> &str {
        self.service.model_id()
    }
}

/// Posts image references to an external vision endpoint
pub struct HttpImageAnalyzer {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    reference: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    #[serde(default)]
    device_hint: Option<String>,
    #[serde(default)]
    error_text: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

impl HttpImageAnalyzer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ImageAnalyzer for HttpImageAnalyzer {
    async fn analyze(&self, reference: &str) -> Result<ImageFinding, AnalysisError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&AnalyzeRequest { reference })
            .send()
            .await
            .map_err(|e| AnalysisError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError(format!("HTTP {status}")));
        }

        let body: AnalyzeResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError(e.to_string()))?;

        Ok(ImageFinding {
            reference: reference.to_string(),
            device_hint: body.device_hint,
            error_text: body.error_text,
            summary: body.summary,
        })
    }
}

/// Delivery that records the ticket and produces a hand-off link.
///
/// The ticket itself is already durable in the ticket store; this channel
/// only has to tell the user where to follow up.
pub struct LinkDelivery {
    base_url: Option<String>,
}

impl LinkDelivery {
    pub fn new(base_url: Option<String>) -> Self {
        Self { base_url }
    }
}

#[async_trait]
impl TicketDelivery for LinkDelivery {
    async fn deliver(
        &self,
        ticket: &Ticket,
        contact: Option<&str>,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        tracing::info!(
            target: "handoff",
            ticket_id = %ticket.id,
            conv_id = %ticket.conversation_id,
            reason = ticket.reason.as_str(),
            has_contact = contact.is_some(),
            "Ticket handed off"
        );

        let Some(base) = &self.base_url else {
            return Ok(DeliveryReceipt::default());
        };
        let url = reqwest::Url::parse_with_params(
            base,
            &[("ticket", ticket.id.as_str()), ("text", &ticket.summary())],
        )
        .map_err(|e| DeliveryError(e.to_string()))?;
        Ok(DeliveryReceipt {
            link: Some(url.to_string()),
        })
    }
}

/// Audit sink writing structured events to the log
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        tracing::info!(
            target: "audit",
            conv_id = %event.conversation_id,
            request_id = %event.request_id,
            stage_before = %event.stage_before,
            stage_after = %event.stage_after,
            input = %event.input,
            buttons = ?event.buttons,
            reply_chars = event.reply_chars,
            ticket_id = ?event.ticket_id,
            "turn"
        );
    }
}

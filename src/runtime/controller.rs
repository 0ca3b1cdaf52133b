//! Per-conversation serialization
//!
//! At most one request per conversation runs at a time. Inside the process a
//! fair async mutex per conversation queues waiters in arrival order; across
//! processes a durable lease in the store does the same job. A request that
//! cannot get both within the wait bound gets a "busy" reply.
//!
//! Every turn runs in its own task, so a caller that goes away does not stop
//! a turn halfway. The lease is renewed while the turn runs and released on
//! every exit path.

use super::orchestrator::{busy, unavailable, Orchestrator};
use super::traits::Storage;
use crate::contract::{ChatResponse, InboundEvent};
use crate::db::{COUNTER_BUSY_REPLIES, COUNTER_LOCKS_RECLAIMED};
use crate::session::Locale;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Delay between attempts on a lease held by another instance
const LEASE_POLL_INTERVAL: Duration = Duration::from_millis(50);
const MIN_RENEW_INTERVAL: Duration = Duration::from_millis(10);
/// Responses kept in process for replays, across all conversations
const MAX_RECENT_RESPONSES: usize = 512;

#[derive(Debug, Clone, Copy)]
pub struct LockSettings {
    /// Lease lifetime; a crashed holder blocks a conversation at most this long
    pub ttl: Duration,
    /// How long a request waits for its turn before getting a busy reply
    pub wait: Duration,
}

impl LockSettings {
    /// The lease is renewed three times per lifetime while a turn runs
    fn renew_interval(&self) -> Duration {
        (self.ttl / 3).max(MIN_RENEW_INTERVAL)
    }
}

/// Latest responses by (conversation, request id).
///
/// Answers a replay even when the session that carries the durable copy
/// could not be saved.
#[derive(Default)]
struct RecentResponses {
    order: VecDeque<(String, String)>,
    responses: HashMap<(String, String), ChatResponse>,
}

impl RecentResponses {
    fn get(&self, conversation_id: &str, request_id: &str) -> Option<ChatResponse> {
        self.responses
            .get(&(conversation_id.to_string(), request_id.to_string()))
            .cloned()
    }

    fn insert(&mut self, conversation_id: &str, request_id: &str, response: ChatResponse) {
        let key = (conversation_id.to_string(), request_id.to_string());
        if self.responses.contains_key(&key) {
            return;
        }
        while self.order.len() >= MAX_RECENT_RESPONSES {
            if let Some(oldest) = self.order.pop_front() {
                self.responses.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.responses.insert(key, response);
    }
}

/// A held durable lease.
///
/// Dropping it without [`Lease::release`] still frees the row, from a
/// background task.
struct Lease<S: Storage + 'static> {
    orchestrator: Arc<Orchestrator<S>>,
    conversation_id: String,
    owner: String,
    released: bool,
}

impl<S: Storage + 'static> Lease<S> {
    async fn renew(&self, ttl: Duration) {
        match self
            .orchestrator
            .store()
            .try_acquire(&self.conversation_id, &self.owner, ttl)
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::error!(
                conv_id = %self.conversation_id,
                owner = %self.owner,
                alert = "lease_lost",
                "Conversation lease taken over while a turn was running"
            ),
            Err(e) => {
                tracing::warn!(conv_id = %self.conversation_id, error = %e, "Lease renewal failed");
            }
        }
    }

    async fn release(mut self) {
        self.released = true;
        release_lease(self.orchestrator.store(), &self.conversation_id, &self.owner).await;
    }
}

impl<S: Storage + 'static> Drop for Lease<S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(conv_id = %self.conversation_id, "No runtime to release lease, it will expire");
            return;
        };
        let orchestrator = Arc::clone(&self.orchestrator);
        let conversation_id = std::mem::take(&mut self.conversation_id);
        let owner = std::mem::take(&mut self.owner);
        runtime.spawn(async move {
            release_lease(orchestrator.store(), &conversation_id, &owner).await;
        });
    }
}

async fn release_lease<S: Storage>(store: &S, conversation_id: &str, owner: &str) {
    if let Err(e) = store.release(conversation_id, owner).await {
        tracing::warn!(conv_id = %conversation_id, error = %e, "Lease release failed, will expire");
    }
}

/// Wait for a spawned turn; a panicked turn still gets a reply
async fn join_turn(turn: JoinHandle<ChatResponse>, conversation_id: &str) -> ChatResponse {
    match turn.await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(
                conv_id = %conversation_id,
                error = %e,
                alert = "turn_failed",
                "Turn task failed"
            );
            unavailable(conversation_id, Locale::default())
        }
    }
}

pub struct ConcurrencyController<S: Storage> {
    orchestrator: Arc<Orchestrator<S>>,
    local: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    recent: Mutex<RecentResponses>,
    settings: LockSettings,
    instance_id: String,
}

impl<S: Storage + 'static> ConcurrencyController<S> {
    pub fn new(orchestrator: Arc<Orchestrator<S>>, settings: LockSettings) -> Self {
        Self {
            orchestrator,
            local: Mutex::new(HashMap::new()),
            recent: Mutex::new(RecentResponses::default()),
            settings,
            instance_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator<S> {
        &self.orchestrator
    }

    fn local_lock(&self, conversation_id: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.local.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drop the map entry once nobody else holds or waits on it
    fn prune(&self, conversation_id: &str) {
        let mut map = self.local.lock().unwrap_or_else(PoisonError::into_inner);
        if map
            .get(conversation_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(conversation_id);
        }
    }

    /// Poll the durable lease until it is ours or the deadline passes.
    ///
    /// A store error lets the request through on the in-process lock alone.
    async fn acquire_lease(
        &self,
        conversation_id: &str,
        owner: String,
        deadline: Instant,
    ) -> Option<Lease<S>> {
        let store = self.orchestrator.store();
        loop {
            match store
                .try_acquire(conversation_id, &owner, self.settings.ttl)
                .await
            {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        conv_id = %conversation_id,
                        error = %e,
                        "Lease store unavailable, continuing with local lock only"
                    );
                    break;
                }
            }
            if Instant::now() + LEASE_POLL_INTERVAL > deadline {
                return None;
            }
            tokio::time::sleep(LEASE_POLL_INTERVAL).await;
        }
        Some(Lease {
            orchestrator: Arc::clone(&self.orchestrator),
            conversation_id: conversation_id.to_string(),
            owner,
            released: false,
        })
    }

    async fn busy_reply(&self, conversation_id: &str) -> ChatResponse {
        tracing::info!(conv_id = %conversation_id, "Conversation busy");
        self.orchestrator.bump(COUNTER_BUSY_REPLIES).await;
        let session = self
            .orchestrator
            .store()
            .get(conversation_id)
            .await
            .ok()
            .flatten();
        busy(session.as_ref(), conversation_id)
    }

    /// Drive `work` to completion, renewing the lease on the way
    async fn run_renewing<Fut>(&self, lease: &Lease<S>, work: Fut) -> ChatResponse
    where
        Fut: Future<Output = ChatResponse>,
    {
        let period = self.settings.renew_interval();
        let mut renew = tokio::time::interval_at(Instant::now() + period, period);
        renew.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(work);
        loop {
            tokio::select! {
                response = &mut work => return response,
                _ = renew.tick() => lease.renew(self.settings.ttl).await,
            }
        }
    }

    /// Run `work` while holding the conversation's lock and lease
    async fn serialized<F, Fut>(&self, conversation_id: &str, work: F) -> ChatResponse
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ChatResponse>,
    {
        let deadline = Instant::now() + self.settings.wait;
        let local = self.local_lock(conversation_id);

        let Ok(guard) = tokio::time::timeout_at(deadline, local.lock_owned()).await else {
            self.prune(conversation_id);
            return self.busy_reply(conversation_id).await;
        };

        let owner = format!("{}:{}", self.instance_id, uuid::Uuid::new_v4());
        let Some(lease) = self.acquire_lease(conversation_id, owner, deadline).await else {
            drop(guard);
            self.prune(conversation_id);
            return self.busy_reply(conversation_id).await;
        };

        let response = self.run_renewing(&lease, work()).await;

        lease.release().await;
        drop(guard);
        self.prune(conversation_id);
        response
    }

    fn recent_response(&self, event: &InboundEvent) -> Option<ChatResponse> {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.conversation_id, &event.request_id)
    }

    /// Replay from memory first, then let the orchestrator run the turn
    async fn process_once(&self, event: &InboundEvent) -> ChatResponse {
        if let Some(cached) = self.recent_response(event) {
            tracing::info!(
                conv_id = %event.conversation_id,
                request_id = %event.request_id,
                "Replaying recent response"
            );
            return cached;
        }
        let response = self.orchestrator.process(event).await;
        if !event.request_id.is_empty() {
            self.recent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(&event.conversation_id, &event.request_id, response.clone());
        }
        response
    }

    /// Process one inbound event, serialized per conversation
    pub async fn handle(self: &Arc<Self>, event: InboundEvent) -> ChatResponse {
        let conversation_id = event.conversation_id.clone();
        let controller = Arc::clone(self);
        let turn = tokio::spawn(async move {
            let conversation_id = event.conversation_id.clone();
            controller
                .serialized(&conversation_id, || controller.process_once(&event))
                .await
        });
        join_turn(turn, &conversation_id).await
    }

    /// Opening message, serialized like any other event
    pub async fn greet(self: &Arc<Self>, conversation_id: &str) -> ChatResponse {
        let controller = Arc::clone(self);
        let id = conversation_id.to_string();
        let turn = tokio::spawn(async move {
            let orchestrator = &controller.orchestrator;
            controller.serialized(&id, || orchestrator.greet(&id)).await
        });
        join_turn(turn, conversation_id).await
    }

    /// Reclaim leases left behind by crashed holders
    pub async fn reclaim_stale(&self) -> usize {
        match self.orchestrator.store().reclaim_stale().await {
            Ok(0) => 0,
            Ok(n) => {
                tracing::info!(reclaimed = n, "Reclaimed stale conversation locks");
                self.orchestrator
                    .bump_by(COUNTER_LOCKS_RECLAIMED, i64::try_from(n).unwrap_or(i64::MAX))
                    .await;
                n
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stale lock sweep failed");
                0
            }
        }
    }

    /// Sweep stale leases every half TTL until cancelled
    pub fn spawn_reaper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        let period = (self.settings.ttl / 2).max(Duration::from_millis(100));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        tracing::debug!("Lock reaper stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        controller.reclaim_stale().await;
                    }
                }
            }
        })
    }
}

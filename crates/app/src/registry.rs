//! Session registry: the authoritative map from organization to session.
//!
//! Each organization gets one slot holding its [`SessionState`] and, while
//! connected, the handle of its connection worker. Mutating calls for one
//! organization are serialized by the slot's async mutex, which is never
//! held while the provider opens a session; the map itself is
//! a [`DashMap`] whose guards are never held across an await, so different
//! organizations never block each other.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{Mutex, Semaphore, mpsc, oneshot};
use tokio::time::Instant;

use chathub_domain::error::{
    CapacityError, ChatHubError, NotReadyError, ProviderError, TimeoutError,
};
use chathub_domain::event::{SessionEvent, SessionEventKind};
use chathub_domain::id::OrganizationId;
use chathub_domain::message::{
    ChannelMessage, Contact, OutboundSendRequest, SendReceipt, normalize_address, read_limit,
};
use chathub_domain::session::{SessionState, SessionStatus, Transition};

use crate::ingestion::InboundEnvelope;
use crate::ports::{ChannelProvider, ChannelSession, EventPublisher, MessageSender};
use crate::qr_cache::QrCodeCache;
use crate::retry::RetryPolicy;
use crate::worker::{ConnectionWorker, SharedState, WorkerHandle};

/// Buffer of the per-session provider event channel.
const PROVIDER_EVENT_BUFFER: usize = 64;

/// Tunables for session handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on concurrently connected organizations.
    pub max_sessions: usize,
    /// Lifetime of a pairing code before it is regenerated.
    pub qr_ttl: Duration,
    /// Time allowed from `connect` until the session is ready.
    pub handshake_timeout: Duration,
    /// Bound on each contacts/messages read.
    pub read_timeout: Duration,
    /// Retry schedule for opening sessions and sending messages.
    pub retry: RetryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 100,
            qr_ttl: Duration::from_secs(60),
            handshake_timeout: Duration::from_secs(5 * 60),
            read_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// What is attached to a slot besides its state.
enum Attachment<S> {
    Idle,
    /// The provider is opening a session. Dropping the sender cancels it.
    Opening(oneshot::Sender<()>),
    Running(WorkerHandle<S>),
}

impl<S: ChannelSession> Attachment<S> {
    /// Detach whatever runs, cancelling a pending open.
    async fn release(&mut self) {
        if let Self::Running(handle) = std::mem::replace(self, Self::Idle) {
            handle.shutdown().await;
        }
    }
}

struct Slot<S> {
    state: SharedState,
    attachment: Mutex<Attachment<S>>,
}

impl<S> Slot<S> {
    fn new(organization_id: OrganizationId) -> Self {
        Self {
            state: SharedState::new(organization_id),
            attachment: Mutex::new(Attachment::Idle),
        }
    }
}

/// Owns every organization's session.
pub struct SessionRegistry<P: ChannelProvider, E> {
    provider: P,
    publisher: Arc<E>,
    qr_cache: Arc<QrCodeCache>,
    inbound: mpsc::Sender<InboundEnvelope>,
    slots: DashMap<OrganizationId, Arc<Slot<P::Session>>>,
    capacity: Arc<Semaphore>,
    config: SessionConfig,
}

impl<P, E> SessionRegistry<P, E>
where
    P: ChannelProvider + Send + Sync,
    E: EventPublisher + Send + Sync + 'static,
{
    /// Create a registry. Raw messages pushed by providers are forwarded to
    /// `inbound`.
    pub fn new(
        provider: P,
        publisher: Arc<E>,
        qr_cache: Arc<QrCodeCache>,
        inbound: mpsc::Sender<InboundEnvelope>,
        config: SessionConfig,
    ) -> Self {
        Self {
            provider,
            publisher,
            qr_cache,
            inbound,
            slots: DashMap::new(),
            capacity: Arc::new(Semaphore::new(config.max_sessions)),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current state, [`SessionStatus::Uninitialized`] when the organization
    /// was never connected. `qr_code` reflects the cache, so an expired code
    /// is never reported.
    #[must_use]
    pub fn get(&self, organization_id: &OrganizationId) -> SessionState {
        match self.existing_slot(organization_id) {
            Some(slot) => self.with_live_qr(slot.state.snapshot()),
            None => SessionState::uninitialized(organization_id.clone()),
        }
    }

    /// Snapshot of every known session, ordered by organization.
    #[must_use]
    pub fn list(&self) -> Vec<SessionState> {
        let mut states: Vec<SessionState> = self
            .slots
            .iter()
            .map(|entry| entry.value().state.snapshot())
            .collect();
        states.sort_by(|a, b| a.organization_id.cmp(&b.organization_id));
        states.into_iter().map(|s| self.with_live_qr(s)).collect()
    }

    /// Current pairing code, if one is live.
    #[must_use]
    pub fn qr(&self, organization_id: &OrganizationId) -> Option<String> {
        self.qr_cache.get(organization_id)
    }

    /// Start the organization's session. A no-op while a session is
    /// connecting, waiting for a scan, or ready.
    ///
    /// The handshake deadline starts here: time spent opening counts
    /// against it. A [`Self::disconnect`] issued while the provider is still
    /// opening cancels the open, and this call then returns the
    /// disconnected state.
    ///
    /// # Errors
    ///
    /// - [`ChatHubError::CapacityExceeded`] when `max_sessions` are running
    /// - [`ChatHubError::Provider`] when the provider refused to open
    /// - [`ChatHubError::Timeout`] when opening exceeded the handshake ceiling
    ///
    /// In the last two cases the session ends up [`SessionStatus::Failed`].
    #[tracing::instrument(skip(self, organization_id), fields(organization_id = %organization_id))]
    pub async fn connect(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<SessionState, ChatHubError> {
        let slot = self.slot(organization_id);
        let (permit, mut cancelled) = {
            let mut attachment = slot.attachment.lock().await;

            let current = slot.state.status();
            if current.is_active() {
                tracing::debug!(status = %current, "connect ignored, session already active");
                return Ok(self.with_live_qr(slot.state.snapshot()));
            }

            let permit = Arc::clone(&self.capacity)
                .try_acquire_owned()
                .map_err(|_| CapacityError {
                    limit: self.config.max_sessions,
                })?;

            attachment.release().await;

            slot.state.apply(Transition::Connect);
            self.publish(organization_id, &slot.state, SessionEventKind::Connecting, None).await;

            let (cancel, cancelled) = oneshot::channel();
            *attachment = Attachment::Opening(cancel);
            (permit, cancelled)
        };

        let deadline = Instant::now() + self.config.handshake_timeout;
        let (events_tx, events_rx) = mpsc::channel(PROVIDER_EVENT_BUFFER);
        let open = self.config.retry.run("open_session", || {
            self.provider.open(organization_id, events_tx.clone())
        });
        let opened = tokio::select! {
            opened = tokio::time::timeout_at(deadline, open) => opened,
            _ = &mut cancelled => {
                tracing::info!("session open cancelled");
                return Ok(self.with_live_qr(slot.state.snapshot()));
            }
        };
        drop(events_tx);

        let mut attachment = slot.attachment.lock().await;
        if !matches!(cancelled.try_recv(), Err(TryRecvError::Empty)) {
            // Disconnected between the open completing and the relock.
            if let Ok(Ok(session)) = opened {
                session.close().await;
            }
            tracing::info!("session open cancelled");
            return Ok(self.with_live_qr(slot.state.snapshot()));
        }
        *attachment = Attachment::Idle;

        let session = match opened {
            Ok(Ok(session)) => session,
            Ok(Err(err)) => {
                let reason = err.to_string();
                self.fail(organization_id, &slot.state, reason).await;
                return Err(err.into());
            }
            Err(_) => {
                let err = TimeoutError {
                    operation: "open session",
                    after: self.config.handshake_timeout,
                };
                self.fail(organization_id, &slot.state, err.to_string()).await;
                return Err(err.into());
            }
        };

        let handle = ConnectionWorker {
            organization_id: organization_id.clone(),
            session: Arc::new(session),
            state: slot.state.clone(),
            qr_cache: Arc::clone(&self.qr_cache),
            publisher: Arc::clone(&self.publisher),
            inbound: self.inbound.clone(),
            qr_ttl: self.config.qr_ttl,
            handshake_timeout: self.config.handshake_timeout,
            handshake_deadline: deadline,
        }
        .spawn(events_rx, permit);
        *attachment = Attachment::Running(handle);

        tracing::info!("session connecting");
        Ok(self.with_live_qr(slot.state.snapshot()))
    }

    /// Tear the organization's session down, cancelling an open still in
    /// flight. A no-op when nothing is connected.
    ///
    /// # Errors
    ///
    /// Never fails today; the signature leaves room for providers whose
    /// teardown can.
    #[tracing::instrument(skip(self, organization_id), fields(organization_id = %organization_id))]
    pub async fn disconnect(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<SessionState, ChatHubError> {
        let Some(slot) = self.existing_slot(organization_id) else {
            return Ok(SessionState::uninitialized(organization_id.clone()));
        };
        slot.attachment.lock().await.release().await;
        self.qr_cache.clear(organization_id);

        if slot.state.apply(Transition::Teardown) {
            tracing::info!("session disconnected");
            self.publish(organization_id, &slot.state, SessionEventKind::Disconnected, None).await;
        }
        Ok(slot.state.snapshot())
    }

    /// Disconnect every organization, e.g. on shutdown.
    pub async fn disconnect_all(&self) {
        let organizations: Vec<OrganizationId> =
            self.slots.iter().map(|entry| entry.key().clone()).collect();
        for organization_id in organizations {
            if let Err(err) = self.disconnect(&organization_id).await {
                tracing::warn!(%organization_id, error = %err, "failed to disconnect session");
            }
        }
    }

    /// Send a text message through a ready session. Transient provider
    /// errors are retried with the configured policy.
    ///
    /// # Errors
    ///
    /// - [`ChatHubError::NotReady`] unless the session is ready; the
    ///   provider is not called
    /// - [`ChatHubError::Provider`] for fatal or exhausted provider errors
    #[tracing::instrument(
        skip(self, request),
        fields(organization_id = %request.organization_id(), to = request.to_address())
    )]
    pub async fn send(&self, request: OutboundSendRequest) -> Result<SendReceipt, ChatHubError> {
        let session = self.ready_session(request.organization_id()).await?;
        let receipt = self
            .config
            .retry
            .run("send_text", || {
                session.send_text(request.to_address(), request.body())
            })
            .await?;
        tracing::info!(message_id = %receipt.message_id, "message sent");
        Ok(receipt)
    }

    /// Contacts of a ready session.
    ///
    /// # Errors
    ///
    /// [`ChatHubError::NotReady`], [`ChatHubError::Timeout`] or
    /// [`ChatHubError::Provider`].
    pub async fn contacts(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<Contact>, ChatHubError> {
        let session = self.ready_session(organization_id).await?;
        self.bounded_read("contacts", session.contacts()).await
    }

    /// Most recent messages across chats. `limit` defaults to 50 and must
    /// lie in `1..=1000`.
    ///
    /// # Errors
    ///
    /// [`ChatHubError::Validation`] for an out-of-range limit, checked
    /// before the session; otherwise [`ChatHubError::NotReady`],
    /// [`ChatHubError::Timeout`] or [`ChatHubError::Provider`].
    pub async fn messages(
        &self,
        organization_id: &OrganizationId,
        limit: Option<usize>,
    ) -> Result<Vec<ChannelMessage>, ChatHubError> {
        let limit = read_limit(limit)?;
        let session = self.ready_session(organization_id).await?;
        self.bounded_read("messages", session.messages(limit)).await
    }

    /// Most recent messages of one chat.
    ///
    /// # Errors
    ///
    /// [`ChatHubError::Validation`] for a malformed chat id, otherwise as
    /// [`Self::messages`].
    pub async fn chat_messages(
        &self,
        organization_id: &OrganizationId,
        chat_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ChannelMessage>, ChatHubError> {
        let limit = read_limit(limit)?;
        let chat_id = normalize_address(chat_id).map_err(ChatHubError::from)?;
        let session = self.ready_session(organization_id).await?;
        self.bounded_read("chat messages", session.chat_messages(&chat_id, limit))
            .await
    }

    fn slot(&self, organization_id: &OrganizationId) -> Arc<Slot<P::Session>> {
        let entry = self
            .slots
            .entry(organization_id.clone())
            .or_insert_with(|| Arc::new(Slot::new(organization_id.clone())));
        Arc::clone(entry.value())
    }

    fn existing_slot(&self, organization_id: &OrganizationId) -> Option<Arc<Slot<P::Session>>> {
        self.slots
            .get(organization_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    fn with_live_qr(&self, mut state: SessionState) -> SessionState {
        state.qr_code = if state.status == SessionStatus::AwaitingQrScan {
            self.qr_cache.get(&state.organization_id)
        } else {
            None
        };
        state
    }

    async fn ready_session(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Arc<P::Session>, ChatHubError> {
        let not_ready = |status| NotReadyError {
            organization_id: organization_id.to_string(),
            status,
        };
        let slot = self
            .existing_slot(organization_id)
            .ok_or_else(|| not_ready(SessionStatus::Uninitialized))?;

        let status = slot.state.status();
        if status != SessionStatus::Ready {
            return Err(not_ready(status).into());
        }
        match &*slot.attachment.lock().await {
            Attachment::Running(handle) => Ok(handle.session()),
            Attachment::Idle | Attachment::Opening(_) => Err(not_ready(slot.state.status()).into()),
        }
    }

    async fn bounded_read<T>(
        &self,
        operation: &'static str,
        read: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ChatHubError> {
        match tokio::time::timeout(self.config.read_timeout, read).await {
            Ok(result) => result.map_err(ChatHubError::from),
            Err(_) => Err(TimeoutError {
                operation,
                after: self.config.read_timeout,
            }
            .into()),
        }
    }

    async fn fail(&self, organization_id: &OrganizationId, state: &SharedState, reason: String) {
        tracing::warn!(%reason, "failed to open session");
        if state.apply(Transition::Fail(reason.clone())) {
            self.publish(organization_id, state, SessionEventKind::AuthFailure, Some(reason)).await;
        }
    }

    async fn publish(
        &self,
        organization_id: &OrganizationId,
        state: &SharedState,
        kind: SessionEventKind,
        detail: Option<String>,
    ) {
        let event = SessionEvent::new(organization_id.clone(), kind, state.status(), detail);
        if let Err(err) = self.publisher.publish(event).await {
            tracing::warn!(error = %err, "failed to publish session event");
        }
    }
}

impl<P, E> MessageSender for SessionRegistry<P, E>
where
    P: ChannelProvider + Send + Sync,
    E: EventPublisher + Send + Sync + 'static,
{
    fn send(
        &self,
        request: OutboundSendRequest,
    ) -> impl Future<Output = Result<SendReceipt, ChatHubError>> + Send {
        SessionRegistry::send(self, request)
    }
}

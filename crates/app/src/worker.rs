//! Connection worker: one task per organization driving its channel
//! session through the pairing handshake and forwarding what the channel
//! reports.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use chathub_domain::event::{SessionEvent, SessionEventKind};
use chathub_domain::id::OrganizationId;
use chathub_domain::session::{SessionState, SessionStatus, Transition};
use chathub_domain::time::now;

use crate::ingestion::InboundEnvelope;
use crate::ports::{ChannelSession, EventPublisher, ProviderEvent};
use crate::qr_cache::QrCodeCache;

/// Session state shared between the registry and the organization's worker.
#[derive(Debug, Clone)]
pub(crate) struct SharedState(Arc<RwLock<SessionState>>);

impl SharedState {
    pub(crate) fn new(organization_id: OrganizationId) -> Self {
        Self(Arc::new(RwLock::new(SessionState::uninitialized(
            organization_id,
        ))))
    }

    pub(crate) fn snapshot(&self) -> SessionState {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn status(&self) -> SessionStatus {
        self.0.read().unwrap_or_else(PoisonError::into_inner).status
    }

    /// Apply a transition, logging it either way.
    pub(crate) fn apply(&self, transition: Transition) -> bool {
        let mut state = self.0.write().unwrap_or_else(PoisonError::into_inner);
        let from = state.status;
        let label = format!("{transition:?}");
        let applied = state.apply(transition);
        if applied {
            tracing::debug!(
                organization_id = %state.organization_id,
                %from,
                to = %state.status,
                "session transition"
            );
        } else {
            tracing::debug!(
                organization_id = %state.organization_id,
                status = %from,
                transition = %label,
                "ignored out-of-graph transition"
            );
        }
        applied
    }
}

/// Everything a worker task needs.
pub(crate) struct ConnectionWorker<S, E> {
    pub(crate) organization_id: OrganizationId,
    pub(crate) session: Arc<S>,
    pub(crate) state: SharedState,
    pub(crate) qr_cache: Arc<QrCodeCache>,
    pub(crate) publisher: Arc<E>,
    pub(crate) inbound: mpsc::Sender<InboundEnvelope>,
    pub(crate) qr_ttl: Duration,
    pub(crate) handshake_timeout: Duration,
    /// Set when `connect` started; opening the session already used part of it.
    pub(crate) handshake_deadline: Instant,
}

/// Registry-side handle on a running worker.
pub(crate) struct WorkerHandle<S> {
    session: Arc<S>,
    task: JoinHandle<()>,
}

impl<S: ChannelSession> WorkerHandle<S> {
    pub(crate) fn session(&self) -> Arc<S> {
        Arc::clone(&self.session)
    }

    /// Stop the task, wait until it is gone, then close the session.
    pub(crate) async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
        self.session.close().await;
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

impl<S, E> ConnectionWorker<S, E>
where
    S: ChannelSession + Send + Sync + 'static,
    E: EventPublisher + Send + Sync + 'static,
{
    /// Spawn the worker loop. The capacity permit is held for the lifetime
    /// of the task.
    pub(crate) fn spawn(
        self,
        events: mpsc::Receiver<ProviderEvent>,
        permit: OwnedSemaphorePermit,
    ) -> WorkerHandle<S> {
        let session = Arc::clone(&self.session);
        let task = tokio::spawn(self.run(events, permit));
        WorkerHandle { session, task }
    }

    async fn run(
        self,
        mut events: mpsc::Receiver<ProviderEvent>,
        _permit: OwnedSemaphorePermit,
    ) {
        tracing::info!(organization_id = %self.organization_id, "connection worker started");

        let handshake = tokio::time::sleep_until(self.handshake_deadline);
        tokio::pin!(handshake);
        let mut qr_deadline: Option<Instant> = None;

        loop {
            let handshaking = self.state.status().is_handshaking();
            let regenerate_at = qr_deadline.unwrap_or_else(Instant::now);

            let flow = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.on_event(event, &mut qr_deadline).await,
                    None => {
                        self.drop_connection("provider event stream closed".to_string()).await;
                        Flow::Stop
                    }
                },
                () = &mut handshake, if handshaking => {
                    let reason = format!("handshake timed out after {:?}", self.handshake_timeout);
                    self.fail(reason).await;
                    Flow::Stop
                },
                () = tokio::time::sleep_until(regenerate_at), if handshaking && qr_deadline.is_some() => {
                    qr_deadline = self.regenerate_qr().await;
                    Flow::Continue
                },
            };

            if flow == Flow::Stop {
                break;
            }
        }

        self.session.close().await;
        tracing::info!(
            organization_id = %self.organization_id,
            status = %self.state.status(),
            "connection worker stopped"
        );
    }

    async fn on_event(&self, event: ProviderEvent, qr_deadline: &mut Option<Instant>) -> Flow {
        match event {
            ProviderEvent::Qr(code) => {
                if self.on_qr(code).await {
                    *qr_deadline = Some(Instant::now() + self.qr_ttl);
                }
                Flow::Continue
            }
            ProviderEvent::Authenticated => {
                *qr_deadline = None;
                self.on_authenticated(SessionEventKind::Authenticated).await;
                Flow::Continue
            }
            ProviderEvent::Ready => {
                *qr_deadline = None;
                self.on_authenticated(SessionEventKind::Ready).await;
                Flow::Continue
            }
            ProviderEvent::AuthFailure(reason) => {
                if self.fail(reason).await {
                    Flow::Stop
                } else {
                    Flow::Continue
                }
            }
            ProviderEvent::Disconnected(reason) => {
                self.drop_connection(reason).await;
                Flow::Stop
            }
            ProviderEvent::Message(payload) => {
                let envelope = InboundEnvelope {
                    organization_id: self.organization_id.clone(),
                    payload,
                };
                if self.inbound.send(envelope).await.is_err() {
                    tracing::warn!(
                        organization_id = %self.organization_id,
                        "inbound pipeline closed, dropping provider message"
                    );
                }
                Flow::Continue
            }
        }
    }

    async fn on_qr(&self, code: String) -> bool {
        if !self.state.apply(Transition::QrIssued(code.clone())) {
            return false;
        }
        self.qr_cache.set(&self.organization_id, code, self.qr_ttl);
        tracing::info!(organization_id = %self.organization_id, "pairing code issued");
        self.publish(SessionEventKind::QrGenerated, None).await;
        true
    }

    async fn on_authenticated(&self, kind: SessionEventKind) {
        let applied = self.state.apply(Transition::Authenticated(now()));
        if applied || self.state.status() == SessionStatus::Ready {
            self.qr_cache.clear(&self.organization_id);
            if applied {
                tracing::info!(organization_id = %self.organization_id, "session ready");
            }
            self.publish(kind, None).await;
        }
    }

    async fn regenerate_qr(&self) -> Option<Instant> {
        tracing::debug!(
            organization_id = %self.organization_id,
            "pairing code expired, regenerating"
        );
        match self.session.refresh_qr().await {
            Ok(code) => {
                self.on_qr(code).await;
            }
            Err(err) => {
                tracing::warn!(
                    organization_id = %self.organization_id,
                    error = %err,
                    "failed to regenerate pairing code"
                );
            }
        }
        if self.state.status().is_handshaking() {
            Some(Instant::now() + self.qr_ttl)
        } else {
            None
        }
    }

    async fn fail(&self, reason: String) -> bool {
        if !self.state.apply(Transition::Fail(reason.clone())) {
            return false;
        }
        self.qr_cache.clear(&self.organization_id);
        tracing::warn!(organization_id = %self.organization_id, %reason, "session failed");
        self.publish(SessionEventKind::AuthFailure, Some(reason)).await;
        true
    }

    async fn drop_connection(&self, reason: String) {
        self.qr_cache.clear(&self.organization_id);
        if self.state.apply(Transition::Drop(reason.clone())) {
            tracing::warn!(organization_id = %self.organization_id, %reason, "session dropped");
            self.publish(SessionEventKind::Disconnected, Some(reason)).await;
        }
    }

    async fn publish(&self, kind: SessionEventKind, detail: Option<String>) {
        let event = SessionEvent::new(
            self.organization_id.clone(),
            kind,
            self.state.status(),
            detail,
        );
        if let Err(err) = self.publisher.publish(event).await {
            tracing::warn!(
                organization_id = %self.organization_id,
                error = %err,
                "failed to publish session event"
            );
        }
    }
}

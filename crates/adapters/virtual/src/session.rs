//! One simulated channel connection.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::json;
use tokio::sync::mpsc;

use chathub_app::ports::{ChannelSession, ProviderEvent};
use chathub_domain::error::ProviderError;
use chathub_domain::id::OrganizationId;
use chathub_domain::message::{ChannelMessage, Contact, SendReceipt, address_phone};
use chathub_domain::time::now;

use crate::Sessions;

/// Address the simulated account uses for itself.
pub(crate) const OWN_ADDRESS: &str = "me";

/// State shared between a [`VirtualSession`] and the provider that opened it.
pub(crate) struct Shared {
    pub(crate) organization_id: OrganizationId,
    events: mpsc::Sender<ProviderEvent>,
    closed: AtomicBool,
    qr_generation: AtomicU64,
    message_seq: AtomicU64,
    log: Mutex<Vec<ChannelMessage>>,
}

impl Shared {
    pub(crate) fn new(
        organization_id: OrganizationId,
        events: mpsc::Sender<ProviderEvent>,
    ) -> Self {
        Self {
            organization_id,
            events,
            closed: AtomicBool::new(false),
            qr_generation: AtomicU64::new(0),
            message_seq: AtomicU64::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), ProviderError> {
        if self.is_closed() {
            return Err(ProviderError::fatal("virtual session is closed"));
        }
        Ok(())
    }

    pub(crate) fn next_qr(&self) -> String {
        let generation = self.qr_generation.fetch_add(1, Ordering::SeqCst) + 1;
        format!("virtual-qr:{}:{generation}", self.organization_id)
    }

    fn next_message_id(&self, prefix: &str) -> String {
        let seq = self.message_seq.fetch_add(1, Ordering::SeqCst) + 1;
        format!("virtual-{prefix}-{seq}")
    }

    fn record(&self, message: ChannelMessage) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    pub(crate) fn history(&self) -> Vec<ChannelMessage> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) async fn emit(&self, event: ProviderEvent) -> Result<(), ProviderError> {
        self.ensure_open()?;
        self.events
            .send(event)
            .await
            .map_err(|_| ProviderError::fatal("session event channel closed"))
    }

    /// Record a message from `from` and push it to the worker in the flat
    /// webhook shape.
    pub(crate) async fn receive(&self, from: String, body: &str) -> Result<String, ProviderError> {
        self.ensure_open()?;
        let message = ChannelMessage {
            id: self.next_message_id("in"),
            from,
            to: OWN_ADDRESS.to_string(),
            body: body.to_string(),
            timestamp: now().timestamp(),
            is_from_me: false,
        };
        let payload = json!({
            "momment": message.timestamp,
            "messageId": message.id,
            "phone": address_phone(&message.from),
            "fromMe": false,
            "text": { "message": message.body },
        });
        let id = message.id.clone();
        self.record(message);
        self.emit(ProviderEvent::Message(payload)).await?;
        Ok(id)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Simulated connection handed to the session worker.
pub struct VirtualSession {
    pub(crate) shared: Arc<Shared>,
    pub(crate) sessions: Sessions,
}

impl ChannelSession for VirtualSession {
    async fn send_text(&self, to: &str, body: &str) -> Result<SendReceipt, ProviderError> {
        self.shared.ensure_open()?;
        let message_id = self.shared.next_message_id("out");
        self.shared.record(ChannelMessage {
            id: message_id.clone(),
            from: OWN_ADDRESS.to_string(),
            to: to.to_string(),
            body: body.to_string(),
            timestamp: now().timestamp(),
            is_from_me: true,
        });
        tracing::debug!(organization_id = %self.shared.organization_id, to, "virtual send");
        Ok(SendReceipt { message_id })
    }

    async fn refresh_qr(&self) -> Result<String, ProviderError> {
        self.shared.ensure_open()?;
        Ok(self.shared.next_qr())
    }

    async fn contacts(&self) -> Result<Vec<Contact>, ProviderError> {
        self.shared.ensure_open()?;
        let mut peers: Vec<String> = self
            .shared
            .history()
            .into_iter()
            .map(|m| if m.is_from_me { m.to } else { m.from })
            .collect();
        peers.sort();
        peers.dedup();

        Ok(peers
            .into_iter()
            .map(|id| {
                let number = address_phone(&id).to_string();
                Contact {
                    name: number.clone(),
                    pushname: number.clone(),
                    number,
                    is_my_contact: false,
                    id,
                }
            })
            .collect())
    }

    async fn messages(&self, limit: usize) -> Result<Vec<ChannelMessage>, ProviderError> {
        self.shared.ensure_open()?;
        Ok(self
            .shared
            .history()
            .into_iter()
            .rev()
            .take(limit)
            .collect())
    }

    async fn chat_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ProviderError> {
        self.shared.ensure_open()?;
        Ok(self
            .shared
            .history()
            .into_iter()
            .rev()
            .filter(|m| m.from == chat_id || m.to == chat_id)
            .take(limit)
            .collect())
    }

    async fn close(&self) {
        self.shared.close();
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if sessions
            .get(&self.shared.organization_id)
            .is_some_and(|current| Arc::ptr_eq(current, &self.shared))
        {
            sessions.remove(&self.shared.organization_id);
        }
    }
}

//! # chathub-adapter-virtual
//!
//! Simulated chat channel for local runs and tests. No network is involved:
//! pairing codes are generated locally and the "phone" is driven through
//! the `simulate_*` methods.
//!
//! ## Behaviour
//!
//! | Action | Effect |
//! |--------|--------|
//! | `open` | Issues a pairing code `virtual-qr:<org>:<n>` |
//! | auto pairing | After [`VirtualConfig::auto_pair_after`] the session authenticates on its own |
//! | [`VirtualProvider::simulate_scan`] | Authenticates the session immediately |
//! | [`VirtualProvider::simulate_inbound`] | Pushes a flat-shape webhook payload to the worker |
//! | [`VirtualProvider::simulate_disconnect`] | Reports the connection as lost |
//! | `send_text` | Records the message; visible through `messages` and [`VirtualProvider::sent_messages`] |
//!
//! ## Dependency rule
//!
//! Depends on `chathub-app` (port traits) and `chathub-domain` only.

mod session;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::mpsc;

use chathub_app::ports::{ChannelProvider, ProviderEvent};
use chathub_domain::error::ProviderError;
use chathub_domain::id::OrganizationId;
use chathub_domain::message::{ChannelMessage, normalize_address};

use session::Shared;
pub use session::VirtualSession;

pub(crate) type Sessions = Arc<Mutex<HashMap<OrganizationId, Arc<Shared>>>>;

/// Settings of the simulated channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualConfig {
    /// Pair automatically this long after `open`. `None` waits for
    /// [`VirtualProvider::simulate_scan`].
    pub auto_pair_after: Option<Duration>,
}

impl Default for VirtualConfig {
    fn default() -> Self {
        Self {
            auto_pair_after: Some(Duration::from_secs(3)),
        }
    }
}

/// Provider handing out [`VirtualSession`]s.
#[derive(Default)]
pub struct VirtualProvider {
    config: VirtualConfig,
    sessions: Sessions,
}

impl VirtualProvider {
    #[must_use]
    pub fn new(config: VirtualConfig) -> Self {
        Self {
            config,
            sessions: Sessions::default(),
        }
    }

    fn open_session(&self, organization_id: &OrganizationId) -> Result<Arc<Shared>, ProviderError> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(organization_id)
            .cloned()
            .ok_or_else(|| {
                ProviderError::fatal(format!("no open virtual session for {organization_id}"))
            })
    }

    /// Accept the pairing code of the organization's open session.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`ProviderError`] when no session is open.
    pub async fn simulate_scan(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<(), ProviderError> {
        let shared = self.open_session(organization_id)?;
        pair(&shared).await
    }

    /// Deliver a text message from `from` to the organization's session.
    /// Returns the generated channel message id.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`ProviderError`] when no session is open or `from`
    /// is not a valid address.
    pub async fn simulate_inbound(
        &self,
        organization_id: &OrganizationId,
        from: &str,
        body: &str,
    ) -> Result<String, ProviderError> {
        let from = normalize_address(from).map_err(|err| ProviderError::fatal(err.to_string()))?;
        let shared = self.open_session(organization_id)?;
        shared.receive(from, body).await
    }

    /// Report the organization's connection as lost.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`ProviderError`] when no session is open.
    pub async fn simulate_disconnect(
        &self,
        organization_id: &OrganizationId,
        reason: &str,
    ) -> Result<(), ProviderError> {
        let shared = self.open_session(organization_id)?;
        shared
            .emit(ProviderEvent::Disconnected(reason.to_string()))
            .await
    }

    /// Messages sent through the organization's open session, oldest first.
    #[must_use]
    pub fn sent_messages(&self, organization_id: &OrganizationId) -> Vec<ChannelMessage> {
        self.open_session(organization_id)
            .map(|shared| {
                shared
                    .history()
                    .into_iter()
                    .filter(|m| m.is_from_me)
                    .collect()
            })
            .unwrap_or_default()
    }
}

async fn pair(shared: &Shared) -> Result<(), ProviderError> {
    shared.emit(ProviderEvent::Authenticated).await?;
    shared.emit(ProviderEvent::Ready).await
}

async fn auto_pair(shared: Weak<Shared>, delay: Duration) {
    tokio::time::sleep(delay).await;
    let Some(shared) = shared.upgrade() else {
        return;
    };
    if shared.is_closed() {
        return;
    }
    if let Err(err) = pair(&shared).await {
        tracing::debug!(
            organization_id = %shared.organization_id,
            error = %err,
            "auto pairing skipped"
        );
    }
}

impl ChannelProvider for VirtualProvider {
    type Session = VirtualSession;

    async fn open(
        &self,
        organization_id: &OrganizationId,
        events: mpsc::Sender<ProviderEvent>,
    ) -> Result<VirtualSession, ProviderError> {
        let shared = Arc::new(Shared::new(organization_id.clone(), events));
        shared.emit(ProviderEvent::Qr(shared.next_qr())).await?;

        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(organization_id.clone(), Arc::clone(&shared));

        if let Some(delay) = self.config.auto_pair_after {
            tokio::spawn(auto_pair(Arc::downgrade(&shared), delay));
        }
        tracing::debug!(%organization_id, "virtual session opened");

        Ok(VirtualSession {
            shared,
            sessions: Arc::clone(&self.sessions),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chathub_app::ports::ChannelSession;

    fn org(name: &str) -> OrganizationId {
        OrganizationId::new(name).unwrap()
    }

    fn manual() -> VirtualProvider {
        VirtualProvider::new(VirtualConfig {
            auto_pair_after: None,
        })
    }

    #[tokio::test]
    async fn should_issue_qr_code_on_open() {
        let provider = manual();
        let (tx, mut rx) = mpsc::channel(8);

        provider.open(&org("acme"), tx).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(ProviderEvent::Qr("virtual-qr:acme:1".to_string()))
        );
    }

    #[tokio::test]
    async fn should_issue_new_code_on_refresh() {
        let provider = manual();
        let (tx, _rx) = mpsc::channel(8);
        let session = provider.open(&org("acme"), tx).await.unwrap();

        assert_eq!(session.refresh_qr().await.unwrap(), "virtual-qr:acme:2");
    }

    #[tokio::test]
    async fn should_authenticate_on_simulated_scan() {
        let provider = manual();
        let (tx, mut rx) = mpsc::channel(8);
        provider.open(&org("acme"), tx).await.unwrap();
        rx.recv().await.unwrap();

        provider.simulate_scan(&org("acme")).await.unwrap();

        assert_eq!(rx.recv().await, Some(ProviderEvent::Authenticated));
        assert_eq!(rx.recv().await, Some(ProviderEvent::Ready));
    }

    #[tokio::test(start_paused = true)]
    async fn should_pair_automatically_after_delay() {
        let provider = VirtualProvider::new(VirtualConfig {
            auto_pair_after: Some(Duration::from_secs(2)),
        });
        let (tx, mut rx) = mpsc::channel(8);
        let _session = provider.open(&org("acme"), tx).await.unwrap();
        rx.recv().await.unwrap();

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());

        assert_eq!(rx.recv().await, Some(ProviderEvent::Authenticated));
        assert_eq!(rx.recv().await, Some(ProviderEvent::Ready));
    }

    #[tokio::test]
    async fn should_push_inbound_message_in_flat_shape() {
        let provider = manual();
        let (tx, mut rx) = mpsc::channel(8);
        provider.open(&org("acme"), tx).await.unwrap();
        rx.recv().await.unwrap();

        let id = provider
            .simulate_inbound(&org("acme"), "+55 11 99988-7777", "qual o preço?")
            .await
            .unwrap();

        let Some(ProviderEvent::Message(payload)) = rx.recv().await else {
            panic!("expected a message event");
        };
        assert_eq!(payload["messageId"], id.as_str());
        assert_eq!(payload["phone"], "5511999887777");
        assert_eq!(payload["text"]["message"], "qual o preço?");
        assert_eq!(payload["fromMe"], false);
    }

    #[tokio::test]
    async fn should_record_sends_and_list_them_newest_first() {
        let provider = manual();
        let (tx, _rx) = mpsc::channel(8);
        let session = provider.open(&org("acme"), tx).await.unwrap();
        provider
            .simulate_inbound(&org("acme"), "5511999887777", "oi")
            .await
            .unwrap();

        let receipt = session
            .send_text("5511999887777@c.us", "olá!")
            .await
            .unwrap();

        let sent = provider.sent_messages(&org("acme"));
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, receipt.message_id);

        let bodies: Vec<String> = session
            .chat_messages("5511999887777@c.us", 10)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(bodies, vec!["olá!", "oi"]);
        assert_eq!(session.messages(1).await.unwrap().len(), 1);

        let contacts = session.contacts().await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].number, "5511999887777");
    }

    #[tokio::test]
    async fn should_reject_calls_after_close() {
        let provider = manual();
        let (tx, _rx) = mpsc::channel(8);
        let session = provider.open(&org("acme"), tx).await.unwrap();

        session.close().await;
        session.close().await;

        assert!(session.send_text("1@c.us", "x").await.is_err());
        assert!(provider.simulate_scan(&org("acme")).await.is_err());
        assert!(provider.sent_messages(&org("acme")).is_empty());
    }

    #[tokio::test]
    async fn should_keep_newer_session_when_old_one_closes() {
        let provider = manual();
        let (tx1, _rx1) = mpsc::channel(8);
        let old = provider.open(&org("acme"), tx1).await.unwrap();
        let (tx2, mut rx2) = mpsc::channel(8);
        let _new = provider.open(&org("acme"), tx2).await.unwrap();
        rx2.recv().await.unwrap();

        old.close().await;

        provider.simulate_scan(&org("acme")).await.unwrap();
        assert_eq!(rx2.recv().await, Some(ProviderEvent::Authenticated));
    }

    #[tokio::test]
    async fn should_fail_when_no_session_is_open() {
        let provider = manual();
        let err = provider
            .simulate_disconnect(&org("ghost"), "bye")
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }
}

//! [`ChannelProvider`] implementation backed by Z-API instances.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use chathub_app::ports::{ChannelProvider, ChannelSession, ProviderEvent};
use chathub_domain::error::ProviderError;
use chathub_domain::id::OrganizationId;
use chathub_domain::message::{ChannelMessage, Contact, SendReceipt};

use crate::client::ZapiClient;
use crate::config::ZapiConfig;
use crate::error::ZapiError;

/// Opens [`ZapiSession`]s for organizations with a configured instance.
pub struct ZapiProvider {
    http: reqwest::Client,
    config: Arc<ZapiConfig>,
}

impl ZapiProvider {
    /// # Errors
    ///
    /// Returns [`ZapiError::Transport`] when the HTTP client cannot be built.
    pub fn new(config: ZapiConfig) -> Result<Self, ZapiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ZapiError::Transport)?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    fn client_for(&self, organization_id: &OrganizationId) -> Result<ZapiClient, ZapiError> {
        let instance = self
            .config
            .instances
            .get(organization_id)
            .ok_or_else(|| ZapiError::UnknownOrganization(organization_id.to_string()))?;
        Ok(ZapiClient::new(
            self.http.clone(),
            &self.config.base_url,
            instance,
            self.config.client_token.clone(),
        ))
    }
}

async fn emit(events: &mpsc::Sender<ProviderEvent>, event: ProviderEvent) -> bool {
    events.send(event).await.is_ok()
}

/// Watch the instance until it disconnects, fails, or the worker goes away.
async fn poll(
    client: ZapiClient,
    events: mpsc::Sender<ProviderEvent>,
    every: Duration,
    mut connected: bool,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match client.status().await {
            Ok(status) if status.connected && !connected => {
                connected = true;
                if !emit(&events, ProviderEvent::Authenticated).await
                    || !emit(&events, ProviderEvent::Ready).await
                {
                    return;
                }
            }
            Ok(status) if !status.connected && connected => {
                let reason = status
                    .error
                    .unwrap_or_else(|| "instance disconnected".to_string());
                emit(&events, ProviderEvent::Disconnected(reason)).await;
                return;
            }
            Ok(_) => {
                if events.is_closed() {
                    return;
                }
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(error = %err, "z-api status poll failed, will retry");
            }
            Err(err) => {
                let event = if connected {
                    ProviderEvent::Disconnected(err.to_string())
                } else {
                    ProviderEvent::AuthFailure(err.to_string())
                };
                emit(&events, event).await;
                return;
            }
        }
    }
}

impl ChannelProvider for ZapiProvider {
    type Session = ZapiSession;

    async fn open(
        &self,
        organization_id: &OrganizationId,
        events: mpsc::Sender<ProviderEvent>,
    ) -> Result<ZapiSession, ProviderError> {
        let client = self.client_for(organization_id)?;
        let status = client.status().await?;

        let delivered = if status.connected {
            emit(&events, ProviderEvent::Authenticated).await
                && emit(&events, ProviderEvent::Ready).await
        } else {
            let code = client.qr_code().await?;
            emit(&events, ProviderEvent::Qr(code)).await
        };
        if !delivered {
            return Err(ProviderError::fatal("session event channel closed"));
        }

        let poller = tokio::spawn(poll(
            client.clone(),
            events,
            self.config.poll_interval,
            status.connected,
        ));
        tracing::debug!(%organization_id, connected = status.connected, "z-api session opened");

        Ok(ZapiSession {
            client,
            poller,
            logout_on_close: self.config.logout_on_close,
            closed: AtomicBool::new(false),
        })
    }
}

/// Session over one Z-API instance.
pub struct ZapiSession {
    client: ZapiClient,
    poller: JoinHandle<()>,
    logout_on_close: bool,
    closed: AtomicBool,
}

impl ChannelSession for ZapiSession {
    async fn send_text(&self, to: &str, body: &str) -> Result<SendReceipt, ProviderError> {
        Ok(self.client.send_text(to, body).await?)
    }

    async fn refresh_qr(&self) -> Result<String, ProviderError> {
        Ok(self.client.qr_code().await?)
    }

    async fn contacts(&self) -> Result<Vec<Contact>, ProviderError> {
        Ok(self.client.contacts().await?)
    }

    async fn messages(&self, limit: usize) -> Result<Vec<ChannelMessage>, ProviderError> {
        Ok(self.client.recent_messages(limit).await?)
    }

    async fn chat_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ProviderError> {
        Ok(self.client.chat_messages(chat_id, limit).await?)
    }

    async fn close(&self) {
        self.poller.abort();
        if self.closed.swap(true, Ordering::SeqCst) || !self.logout_on_close {
            return;
        }
        if let Err(err) = self.client.disconnect().await {
            tracing::warn!(error = %err, "z-api logout failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZapiInstance;
    use serde_json::json;

    const PREFIX: &str = "/instances/inst-1/token/tok-1";

    fn org() -> OrganizationId {
        OrganizationId::new("acme").unwrap()
    }

    fn provider(server: &mockito::Server, logout_on_close: bool) -> ZapiProvider {
        let mut config = ZapiConfig {
            base_url: server.url(),
            poll_interval: Duration::from_millis(20),
            logout_on_close,
            ..ZapiConfig::default()
        };
        config.instances.insert(
            org(),
            ZapiInstance {
                instance_id: "inst-1".to_string(),
                token: "tok-1".to_string(),
            },
        );
        ZapiProvider::new(config).unwrap()
    }

    async fn mock_status(server: &mut mockito::Server, connected: bool) -> mockito::Mock {
        server
            .mock("GET", format!("{PREFIX}/status").as_str())
            .with_status(200)
            .with_body(json!({ "connected": connected }).to_string())
            .create_async()
            .await
    }

    #[tokio::test]
    async fn should_emit_qr_when_instance_is_not_paired() {
        let mut server = mockito::Server::new_async().await;
        let _status = mock_status(&mut server, false).await;
        let _qr = server
            .mock("GET", format!("{PREFIX}/qr-code").as_str())
            .with_status(200)
            .with_body(json!({ "value": "2@pair-me" }).to_string())
            .create_async()
            .await;
        let (tx, mut rx) = mpsc::channel(8);

        let session = provider(&server, false).open(&org(), tx).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(ProviderEvent::Qr("2@pair-me".to_string()))
        );
        session.close().await;
    }

    #[tokio::test]
    async fn should_emit_ready_when_instance_is_already_paired() {
        let mut server = mockito::Server::new_async().await;
        let _status = mock_status(&mut server, true).await;
        let (tx, mut rx) = mpsc::channel(8);

        let session = provider(&server, false).open(&org(), tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(ProviderEvent::Authenticated));
        assert_eq!(rx.recv().await, Some(ProviderEvent::Ready));
        session.close().await;
    }

    #[tokio::test]
    async fn should_refuse_unconfigured_organization() {
        let server = mockito::Server::new_async().await;
        let (tx, _rx) = mpsc::channel(8);

        let err = provider(&server, false)
            .open(&OrganizationId::new("other").unwrap(), tx)
            .await
            .err()
            .unwrap();

        assert!(!err.is_transient());
        assert!(err.message.contains("other"));
    }

    #[tokio::test]
    async fn should_surface_server_errors_as_transient() {
        let mut server = mockito::Server::new_async().await;
        let _status = server
            .mock("GET", format!("{PREFIX}/status").as_str())
            .with_status(503)
            .create_async()
            .await;
        let (tx, _rx) = mpsc::channel(8);

        let err = provider(&server, false).open(&org(), tx).await.err().unwrap();

        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn should_report_pairing_found_by_poll() {
        let mut server = mockito::Server::new_async().await;
        let _status = mock_status(&mut server, true).await;
        let client = provider(&server, false).client_for(&org()).unwrap();
        let (tx, mut rx) = mpsc::channel(8);

        let poller = tokio::spawn(poll(client, tx, Duration::from_millis(10), false));

        assert_eq!(rx.recv().await, Some(ProviderEvent::Authenticated));
        assert_eq!(rx.recv().await, Some(ProviderEvent::Ready));
        poller.abort();
    }

    #[tokio::test]
    async fn should_report_lost_connection_and_stop_polling() {
        let mut server = mockito::Server::new_async().await;
        let _status = mock_status(&mut server, false).await;
        let client = provider(&server, false).client_for(&org()).unwrap();
        let (tx, mut rx) = mpsc::channel(8);

        let poller = tokio::spawn(poll(client, tx, Duration::from_millis(10), true));

        assert_eq!(
            rx.recv().await,
            Some(ProviderEvent::Disconnected("instance disconnected".to_string()))
        );
        poller.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn should_log_out_once_when_configured() {
        let mut server = mockito::Server::new_async().await;
        let _status = mock_status(&mut server, true).await;
        let logout = server
            .mock("GET", format!("{PREFIX}/disconnect").as_str())
            .with_status(200)
            .with_body(json!({ "value": true }).to_string())
            .expect(1)
            .create_async()
            .await;
        let (tx, _rx) = mpsc::channel(8);
        let session = provider(&server, true).open(&org(), tx).await.unwrap();

        session.close().await;
        session.close().await;

        logout.assert_async().await;
    }
}

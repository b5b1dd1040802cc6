//! In-memory wiring shared by the handler tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use chathub_app::automation_engine::AutomationEngine;
use chathub_app::dispatcher::MessageDispatcher;
use chathub_app::event_bus::InProcessEventBus;
use chathub_app::ingestion::MessageIngestion;
use chathub_app::message_log::MessageLog;
use chathub_app::normalizer::WebhookNormalizer;
use chathub_app::ports::{
    AutomationRepository, ChannelProvider, ChannelSession, MessageStore, ProviderEvent,
};
use chathub_app::qr_cache::QrCodeCache;
use chathub_app::registry::{SessionConfig, SessionRegistry};
use chathub_app::services::automation_service::AutomationService;
use chathub_domain::automation::AutomationRule;
use chathub_domain::error::{ChatHubError, NotFoundError, ProviderError};
use chathub_domain::id::{AutomationRuleId, OrganizationId};
use chathub_domain::message::{ChannelMessage, Contact, InboundMessageEvent, SendReceipt};

use crate::state::AppState;

type Sent = Arc<Mutex<Vec<(String, String)>>>;

/// Provider that pairs instantly when `paired`, otherwise waits on `qr-1`.
pub(crate) struct StubProvider {
    paired: bool,
    sent: Sent,
}

pub(crate) struct StubSession {
    sent: Sent,
    // Keeps the worker's event stream open.
    _events: mpsc::Sender<ProviderEvent>,
}

impl ChannelProvider for StubProvider {
    type Session = StubSession;

    async fn open(
        &self,
        _organization_id: &OrganizationId,
        events: mpsc::Sender<ProviderEvent>,
    ) -> Result<StubSession, ProviderError> {
        let _ = events.send(ProviderEvent::Qr("qr-1".to_string())).await;
        if self.paired {
            let _ = events.send(ProviderEvent::Authenticated).await;
            let _ = events.send(ProviderEvent::Ready).await;
        }
        Ok(StubSession {
            sent: Arc::clone(&self.sent),
            _events: events,
        })
    }
}

impl ChannelSession for StubSession {
    async fn send_text(&self, to: &str, body: &str) -> Result<SendReceipt, ProviderError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_string(), body.to_string()));
        Ok(SendReceipt {
            message_id: format!("sent-{}", sent.len()),
        })
    }

    async fn refresh_qr(&self) -> Result<String, ProviderError> {
        Ok("qr-2".to_string())
    }

    async fn contacts(&self) -> Result<Vec<Contact>, ProviderError> {
        Ok(vec![Contact {
            id: "5511999887777@c.us".to_string(),
            name: "Maria".to_string(),
            pushname: "Maria".to_string(),
            number: "5511999887777".to_string(),
            is_my_contact: true,
        }])
    }

    async fn messages(&self, _limit: usize) -> Result<Vec<ChannelMessage>, ProviderError> {
        Ok(vec![])
    }

    async fn chat_messages(
        &self,
        chat_id: &str,
        _limit: usize,
    ) -> Result<Vec<ChannelMessage>, ProviderError> {
        Ok(vec![ChannelMessage {
            id: "m-1".to_string(),
            from: chat_id.to_string(),
            to: "me".to_string(),
            body: "oi".to_string(),
            timestamp: 1_700_000_000_000,
            is_from_me: false,
        }])
    }

    async fn close(&self) {}
}

#[derive(Default)]
pub(crate) struct InMemoryRules {
    rules: Mutex<HashMap<AutomationRuleId, AutomationRule>>,
}

impl AutomationRepository for InMemoryRules {
    async fn create(&self, rule: AutomationRule) -> Result<AutomationRule, ChatHubError> {
        self.rules.lock().unwrap().insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn get_by_id(
        &self,
        id: AutomationRuleId,
    ) -> Result<Option<AutomationRule>, ChatHubError> {
        Ok(self.rules.lock().unwrap().get(&id).cloned())
    }

    async fn list_for(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<AutomationRule>, ChatHubError> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .values()
            .filter(|r| &r.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn list_active_for(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<AutomationRule>, ChatHubError> {
        let mut rules = self.list_for(organization_id).await?;
        rules.retain(|r| r.is_active);
        Ok(rules)
    }

    async fn update(&self, rule: AutomationRule) -> Result<AutomationRule, ChatHubError> {
        let mut rules = self.rules.lock().unwrap();
        if !rules.contains_key(&rule.id) {
            return Err(NotFoundError {
                entity: "AutomationRule",
                id: rule.id.to_string(),
            }
            .into());
        }
        rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn delete(&self, id: AutomationRuleId) -> Result<(), ChatHubError> {
        self.rules.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn increment_responses_sent(&self, id: AutomationRuleId) -> Result<(), ChatHubError> {
        if let Some(rule) = self.rules.lock().unwrap().get_mut(&id) {
            rule.responses_sent += 1;
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryInbox {
    events: Mutex<Vec<InboundMessageEvent>>,
}

impl MessageStore for InMemoryInbox {
    async fn append(&self, event: InboundMessageEvent) -> Result<(), ChatHubError> {
        let mut events = self.events.lock().unwrap();
        let known = events.iter().any(|e| {
            e.organization_id() == event.organization_id()
                && e.channel_message_id() == event.channel_message_id()
        });
        if !known {
            events.push(event);
        }
        Ok(())
    }

    async fn list_recent(
        &self,
        organization_id: &OrganizationId,
        limit: usize,
    ) -> Result<Vec<InboundMessageEvent>, ChatHubError> {
        let events = self.events.lock().unwrap();
        let mut found: Vec<InboundMessageEvent> = events
            .iter()
            .rev()
            .filter(|e| e.organization_id() == organization_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        found.truncate(limit);
        Ok(found)
    }
}

/// A fully wired router over in-memory adapters.
pub(crate) struct TestApp {
    router: Router,
    sent: Sent,
}

impl TestApp {
    /// Must be called inside a tokio runtime: the ingestion loop is spawned.
    pub(crate) fn new(paired: bool) -> Self {
        let sent = Sent::default();
        let provider = StubProvider {
            paired,
            sent: Arc::clone(&sent),
        };
        let event_bus = Arc::new(InProcessEventBus::new(64));
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        let registry = Arc::new(SessionRegistry::new(
            provider,
            Arc::clone(&event_bus),
            Arc::new(QrCodeCache::new()),
            inbound_tx,
            SessionConfig::default(),
        ));
        let rules = Arc::new(InMemoryRules::default());
        let inbox = Arc::new(InMemoryInbox::default());

        let dispatcher = MessageDispatcher::new()
            .with_handler(Arc::new(MessageLog::new(Arc::clone(&inbox))))
            .with_handler(Arc::new(AutomationEngine::new(
                Arc::clone(&rules),
                Arc::clone(&registry),
            )));
        let ingestion = Arc::new(MessageIngestion::new(
            WebhookNormalizer::default(),
            Arc::new(dispatcher),
        ));
        tokio::spawn(Arc::clone(&ingestion).run(inbound_rx));

        let state = AppState::new(
            registry,
            ingestion,
            Arc::new(AutomationService::new(rules)),
            inbox,
            event_bus,
        );
        Self {
            router: crate::router::build(state),
            sent,
        }
    }

    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Let spawned workers and handlers catch up.
    pub(crate) async fn settle(&self) {
        for _ in 0..100 {
            tokio::task::yield_now().await;
        }
    }

    async fn call(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub(crate) async fn get(&self, uri: &str) -> Response<Body> {
        self.call(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub(crate) async fn delete(&self, uri: &str) -> Response<Body> {
        self.call(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    pub(crate) async fn post_empty(&self, uri: &str) -> Response<Body> {
        self.call(Request::post(uri).body(Body::empty()).unwrap())
            .await
    }

    pub(crate) async fn post_raw(&self, uri: &str, body: &str) -> Response<Body> {
        self.call(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub(crate) async fn post_json(&self, uri: &str, body: &Value) -> Response<Body> {
        self.call(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub(crate) async fn put_json(&self, uri: &str, body: &Value) -> Response<Body> {
        self.call(
            Request::put(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

pub(crate) async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

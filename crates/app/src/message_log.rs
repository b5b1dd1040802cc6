//! Message log: persists every canonical event through a
//! [`MessageStore`].

use async_trait::async_trait;

use chathub_domain::error::ChatHubError;
use chathub_domain::message::InboundMessageEvent;

use crate::dispatcher::MessageHandler;
use crate::ports::MessageStore;

pub struct MessageLog<S> {
    store: S,
}

impl<S: MessageStore + Send + Sync> MessageLog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: MessageStore + Send + Sync> MessageHandler for MessageLog<S> {
    fn name(&self) -> &'static str {
        "message_log"
    }

    async fn handle(&self, event: &InboundMessageEvent) -> Result<(), ChatHubError> {
        self.store.append(event.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chathub_domain::id::OrganizationId;
    use chathub_domain::webhook::WebhookPayload;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryStore {
        events: Mutex<Vec<InboundMessageEvent>>,
    }

    impl MessageStore for InMemoryStore {
        async fn append(&self, event: InboundMessageEvent) -> Result<(), ChatHubError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }

        async fn list_recent(
            &self,
            organization_id: &OrganizationId,
            limit: usize,
        ) -> Result<Vec<InboundMessageEvent>, ChatHubError> {
            Ok(self
                .events
                .lock()
                .unwrap()
                .iter()
                .rev()
                .filter(|e| e.organization_id() == organization_id)
                .take(limit)
                .cloned()
                .collect())
        }
    }

    #[tokio::test]
    async fn should_append_every_event() {
        let log = MessageLog::new(InMemoryStore::default());
        let org = OrganizationId::new("org-1").unwrap();
        let event = WebhookPayload::parse(json!({ "momment": 5, "text": "oi", "id": "m-1" }))
            .into_event(org.clone(), String::new)
            .unwrap();

        log.handle(&event).await.unwrap();

        let stored = log.store.list_recent(&org, 10).await.unwrap();
        assert_eq!(stored, vec![event]);
    }
}

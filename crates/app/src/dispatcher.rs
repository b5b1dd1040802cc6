//! Message dispatcher: fans each canonical event out to every registered
//! [`MessageHandler`] concurrently.
//!
//! Every handler runs in its own task. A handler that errors or panics is
//! logged and reported in the [`DispatchReport`]; the others are not
//! affected.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use chathub_domain::error::ChatHubError;
use chathub_domain::message::InboundMessageEvent;

/// A subscriber to canonical inbound events.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Short stable name used in logs and reports.
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &InboundMessageEvent) -> Result<(), ChatHubError>;
}

/// Outcome of delivering one event to every handler.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub succeeded: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

/// Holds the handler list and delivers events to it.
#[derive(Default)]
pub struct MessageDispatcher {
    handlers: Vec<Arc<dyn MessageHandler>>,
}

impl MessageDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn register(&mut self, handler: Arc<dyn MessageHandler>) {
        self.handlers.push(handler);
    }

    #[must_use]
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Deliver `event` to every handler and wait for all of them.
    #[tracing::instrument(
        skip(self, event),
        fields(organization_id = %event.organization_id(), message_id = event.channel_message_id())
    )]
    pub async fn deliver(&self, event: InboundMessageEvent) -> DispatchReport {
        let event = Arc::new(event);
        let running: Vec<(&'static str, JoinHandle<Result<(), ChatHubError>>)> = self
            .handlers
            .iter()
            .map(|handler| {
                let handler = Arc::clone(handler);
                let event = Arc::clone(&event);
                (
                    handler.name(),
                    tokio::spawn(async move { handler.handle(&event).await }),
                )
            })
            .collect();

        let mut report = DispatchReport::default();
        for (name, task) in running {
            match task.await {
                Ok(Ok(())) => report.succeeded.push(name),
                Ok(Err(err)) => {
                    tracing::warn!(handler = name, error = %err, "message handler failed");
                    report.failed.push((name, err.to_string()));
                }
                Err(join_err) => {
                    let reason = if join_err.is_panic() {
                        "handler panicked".to_string()
                    } else {
                        join_err.to_string()
                    };
                    tracing::error!(handler = name, %reason, "message handler aborted");
                    report.failed.push((name, reason));
                }
            }
        }
        report
    }

    /// Deliver in the background and return immediately.
    pub fn dispatch(self: &Arc<Self>, event: InboundMessageEvent) -> JoinHandle<DispatchReport> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.deliver(event).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chathub_domain::id::OrganizationId;
    use chathub_domain::webhook::WebhookPayload;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    fn event(body: &str) -> InboundMessageEvent {
        WebhookPayload::parse(json!({ "momment": 1, "text": body, "messageId": "m-1" }))
            .into_event(OrganizationId::new("org-1").unwrap(), String::new)
            .unwrap()
    }

    #[derive(Default)]
    struct Recording {
        bodies: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageHandler for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn handle(&self, event: &InboundMessageEvent) -> Result<(), ChatHubError> {
            self.bodies.lock().unwrap().push(event.body().to_string());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl MessageHandler for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle(&self, _event: &InboundMessageEvent) -> Result<(), ChatHubError> {
            Err(ChatHubError::Storage("disk full".into()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl MessageHandler for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn handle(&self, _event: &InboundMessageEvent) -> Result<(), ChatHubError> {
            panic!("boom");
        }
    }

    struct Slow;

    #[async_trait]
    impl MessageHandler for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn handle(&self, _event: &InboundMessageEvent) -> Result<(), ChatHubError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn should_deliver_to_every_handler() {
        let recording = Arc::new(Recording::default());
        let dispatcher = MessageDispatcher::new()
            .with_handler(recording.clone())
            .with_handler(Arc::new(Recording::default()));

        let report = dispatcher.deliver(event("oi")).await;
        assert_eq!(report.succeeded, vec!["recording", "recording"]);
        assert!(report.failed.is_empty());
        assert_eq!(*recording.bodies.lock().unwrap(), vec!["oi".to_string()]);
    }

    #[tokio::test]
    async fn should_isolate_failing_and_panicking_handlers() {
        let recording = Arc::new(Recording::default());
        let dispatcher = MessageDispatcher::new()
            .with_handler(Arc::new(Failing))
            .with_handler(Arc::new(Panicking))
            .with_handler(recording.clone());

        let report = dispatcher.deliver(event("oi")).await;
        assert_eq!(report.succeeded, vec!["recording"]);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].0, "failing");
        assert_eq!(report.failed[1], ("panicking", "handler panicked".to_string()));
        assert_eq!(recording.bodies.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_wait_for_slow_handlers_when_dispatching() {
        let recording = Arc::new(Recording::default());
        let dispatcher = Arc::new(
            MessageDispatcher::new()
                .with_handler(Arc::new(Slow))
                .with_handler(recording.clone()),
        );

        let pending = dispatcher.dispatch(event("oi"));
        assert!(!pending.is_finished());

        let report = pending.await.unwrap();
        assert_eq!(report.succeeded, vec!["slow", "recording"]);
    }

    #[test]
    fn should_list_handler_names() {
        let mut dispatcher = MessageDispatcher::new();
        dispatcher.register(Arc::new(Failing));
        dispatcher.register(Arc::new(Slow));
        assert_eq!(dispatcher.handler_names(), vec!["failing", "slow"]);
    }
}

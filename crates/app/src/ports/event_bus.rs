//! Event bus port: publish/subscribe for session events.

use std::future::Future;

use chathub_domain::error::ChatHubError;
use chathub_domain::event::SessionEvent;

/// Publishes session events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: SessionEvent)
    -> impl Future<Output = Result<(), ChatHubError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        event: SessionEvent,
    ) -> impl Future<Output = Result<(), ChatHubError>> + Send {
        (**self).publish(event)
    }
}

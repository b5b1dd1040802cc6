//! Message store port: append-only log of canonical inbound events.

use std::future::Future;

use chathub_domain::error::ChatHubError;
use chathub_domain::id::OrganizationId;
use chathub_domain::message::InboundMessageEvent;

/// Persists normalized inbound events per organization.
pub trait MessageStore {
    /// Append an event. Re-appending the same `(organization, message id)`
    /// pair is a no-op.
    fn append(
        &self,
        event: InboundMessageEvent,
    ) -> impl Future<Output = Result<(), ChatHubError>> + Send;

    /// Most recent events of an organization, newest first.
    fn list_recent(
        &self,
        organization_id: &OrganizationId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<InboundMessageEvent>, ChatHubError>> + Send;
}

impl<T: MessageStore + Send + Sync> MessageStore for std::sync::Arc<T> {
    fn append(
        &self,
        event: InboundMessageEvent,
    ) -> impl Future<Output = Result<(), ChatHubError>> + Send {
        (**self).append(event)
    }

    fn list_recent(
        &self,
        organization_id: &OrganizationId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<InboundMessageEvent>, ChatHubError>> + Send {
        (**self).list_recent(organization_id, limit)
    }
}

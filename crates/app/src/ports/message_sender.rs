//! Message sender port: outbound text through an organization's session.

use std::future::Future;

use chathub_domain::error::ChatHubError;
use chathub_domain::message::{OutboundSendRequest, SendReceipt};

/// Sends a validated request through the owning organization's session.
///
/// Implemented by [`SessionRegistry`](crate::registry::SessionRegistry);
/// handlers depend on this trait instead of the registry itself.
pub trait MessageSender {
    fn send(
        &self,
        request: OutboundSendRequest,
    ) -> impl Future<Output = Result<SendReceipt, ChatHubError>> + Send;
}

impl<T: MessageSender + Send + Sync> MessageSender for std::sync::Arc<T> {
    fn send(
        &self,
        request: OutboundSendRequest,
    ) -> impl Future<Output = Result<SendReceipt, ChatHubError>> + Send {
        (**self).send(request)
    }
}

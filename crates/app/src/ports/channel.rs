//! Channel ports: the third-party chat channel a session talks to.
//!
//! A [`ChannelProvider`] opens one [`ChannelSession`] per organization and
//! reports what happens on it as [`ProviderEvent`]s over the supplied
//! channel. Dropping every clone of that sender ends the session's worker.

use std::future::Future;

use serde_json::Value;
use tokio::sync::mpsc;

use chathub_domain::error::ProviderError;
use chathub_domain::id::OrganizationId;
use chathub_domain::message::{ChannelMessage, Contact, SendReceipt};

/// Something the channel reports about an open session.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// A pairing code to display.
    Qr(String),
    /// The pairing code was scanned and accepted.
    Authenticated,
    /// The session is fully synchronized and can send.
    Ready,
    /// Pairing was rejected.
    AuthFailure(String),
    /// The connection went away.
    Disconnected(String),
    /// A raw inbound message, forwarded untouched to webhook ingestion.
    Message(Value),
}

/// Opens channel sessions.
pub trait ChannelProvider {
    type Session: ChannelSession + Send + Sync + 'static;

    /// Start a session for `organization_id`. Status changes and inbound
    /// messages are pushed to `events`.
    fn open(
        &self,
        organization_id: &OrganizationId,
        events: mpsc::Sender<ProviderEvent>,
    ) -> impl Future<Output = Result<Self::Session, ProviderError>> + Send;
}

/// One open connection to the channel.
pub trait ChannelSession {
    /// Send a text message to a normalized channel address.
    fn send_text(
        &self,
        to: &str,
        body: &str,
    ) -> impl Future<Output = Result<SendReceipt, ProviderError>> + Send;

    /// Ask the channel for a fresh pairing code.
    fn refresh_qr(&self) -> impl Future<Output = Result<String, ProviderError>> + Send;

    fn contacts(&self) -> impl Future<Output = Result<Vec<Contact>, ProviderError>> + Send;

    /// Most recent messages across all chats.
    fn messages(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ChannelMessage>, ProviderError>> + Send;

    /// Most recent messages of one chat.
    fn chat_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ChannelMessage>, ProviderError>> + Send;

    /// Release the connection. Must be safe to call more than once.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

impl<T: ChannelProvider + Send + Sync> ChannelProvider for std::sync::Arc<T> {
    type Session = T::Session;

    fn open(
        &self,
        organization_id: &OrganizationId,
        events: mpsc::Sender<ProviderEvent>,
    ) -> impl Future<Output = Result<Self::Session, ProviderError>> + Send {
        (**self).open(organization_id, events)
    }
}

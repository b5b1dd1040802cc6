//! Inbound pipeline: webhook bodies and provider-pushed messages both go
//! through the normalizer and then to the dispatcher.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use chathub_domain::id::OrganizationId;

use crate::dispatcher::MessageDispatcher;
use crate::normalizer::{Normalized, WebhookNormalizer};

/// A raw payload tagged with the organization it arrived for.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEnvelope {
    pub organization_id: OrganizationId,
    pub payload: Value,
}

/// What happened to one ingested payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Dispatched,
    Duplicate,
    Unrecognized,
}

impl IngestOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::Duplicate => "duplicate",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Normalizes and hands off. Dispatch runs in the background, so callers
/// (webhook acknowledgements in particular) never wait on handlers.
pub struct MessageIngestion {
    normalizer: WebhookNormalizer,
    dispatcher: Arc<MessageDispatcher>,
}

impl MessageIngestion {
    #[must_use]
    pub fn new(normalizer: WebhookNormalizer, dispatcher: Arc<MessageDispatcher>) -> Self {
        Self {
            normalizer,
            dispatcher,
        }
    }

    pub fn ingest(&self, organization_id: &OrganizationId, payload: Value) -> IngestOutcome {
        match self.normalizer.normalize(organization_id, payload) {
            Normalized::Event(event) => {
                drop(self.dispatcher.dispatch(event));
                IngestOutcome::Dispatched
            }
            Normalized::Duplicate => IngestOutcome::Duplicate,
            Normalized::Unrecognized => IngestOutcome::Unrecognized,
        }
    }

    /// Drain payloads pushed by connection workers until every sender is
    /// gone.
    pub async fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<InboundEnvelope>) {
        while let Some(envelope) = inbound.recv().await {
            let outcome = self.ingest(&envelope.organization_id, envelope.payload);
            tracing::trace!(
                organization_id = %envelope.organization_id,
                outcome = outcome.as_str(),
                "provider message ingested"
            );
        }
        tracing::debug!("inbound pipeline closed");
    }
}

//! Shared application state for axum handlers.

use std::sync::Arc;

use chathub_app::event_bus::InProcessEventBus;
use chathub_app::ingestion::MessageIngestion;
use chathub_app::ports::{AutomationRepository, ChannelProvider, MessageStore};
use chathub_app::registry::SessionRegistry;
use chathub_app::services::automation_service::AutomationService;

/// Session registry publishing on the in-process bus the SSE stream reads.
pub type Registry<P> = SessionRegistry<P, InProcessEventBus>;

/// Application state shared across all axum handlers.
///
/// Generic over the channel provider, the automation repository and the
/// message store to avoid dynamic dispatch. `Clone` is implemented manually
/// so the underlying types themselves do not need to be `Clone`; only the
/// `Arc` wrappers are cloned.
pub struct AppState<P: ChannelProvider, AR, MS> {
    pub registry: Arc<Registry<P>>,
    /// Webhook entry point into normalization and dispatch.
    pub ingestion: Arc<MessageIngestion>,
    pub automation_service: Arc<AutomationService<AR>>,
    /// Persisted inbound events, served by the inbox route.
    pub message_store: Arc<MS>,
    /// Source of the SSE stream.
    pub event_bus: Arc<InProcessEventBus>,
}

impl<P: ChannelProvider, AR, MS> Clone for AppState<P, AR, MS> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            ingestion: Arc::clone(&self.ingestion),
            automation_service: Arc::clone(&self.automation_service),
            message_store: Arc::clone(&self.message_store),
            event_bus: Arc::clone(&self.event_bus),
        }
    }
}

impl<P, AR, MS> AppState<P, AR, MS>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    /// Create the state from pre-wrapped `Arc` services, which the
    /// composition root also shares with background tasks.
    pub fn new(
        registry: Arc<Registry<P>>,
        ingestion: Arc<MessageIngestion>,
        automation_service: Arc<AutomationService<AR>>,
        message_store: Arc<MS>,
        event_bus: Arc<InProcessEventBus>,
    ) -> Self {
        Self {
            registry,
            ingestion,
            automation_service,
            message_store,
            event_bus,
        }
    }
}

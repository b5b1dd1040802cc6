//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod automations;
#[allow(clippy::missing_errors_doc)]
pub mod messages;
#[allow(clippy::missing_errors_doc)]
pub mod sessions;
pub mod sse;
pub mod webhook;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

use chathub_app::ports::{AutomationRepository, ChannelProvider, MessageStore};
use chathub_domain::error::ChatHubError;
use chathub_domain::id::OrganizationId;

use crate::error::ApiError;
use crate::state::AppState;

/// Parse the `{org}` path segment.
pub(crate) fn organization(raw: &str) -> Result<OrganizationId, ApiError> {
    OrganizationId::new(raw).map_err(|err| ApiError::from(ChatHubError::from(err)))
}

/// Build the `/api` sub-router.
pub fn routes<P, AR, MS>() -> Router<AppState<P, AR, MS>>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    Router::new()
        // Sessions
        .route("/sessions", get(sessions::list::<P, AR, MS>))
        .route(
            "/organizations/{org}/connect",
            post(sessions::connect::<P, AR, MS>),
        )
        .route(
            "/organizations/{org}/status",
            get(sessions::status::<P, AR, MS>),
        )
        .route("/organizations/{org}/qr", get(sessions::qr::<P, AR, MS>))
        .route(
            "/organizations/{org}/disconnect",
            post(sessions::disconnect::<P, AR, MS>),
        )
        // Messages
        .route(
            "/organizations/{org}/send",
            post(messages::send::<P, AR, MS>),
        )
        .route(
            "/organizations/{org}/contacts",
            get(messages::contacts::<P, AR, MS>),
        )
        .route(
            "/organizations/{org}/messages",
            get(messages::recent::<P, AR, MS>),
        )
        .route(
            "/organizations/{org}/messages/{chat_id}",
            get(messages::chat::<P, AR, MS>),
        )
        .route(
            "/organizations/{org}/inbox",
            get(messages::inbox::<P, AR, MS>),
        )
        // Webhook
        .route(
            "/organizations/{org}/webhook",
            post(webhook::receive::<P, AR, MS>).layer(DefaultBodyLimit::disable()),
        )
        // Automations
        .route(
            "/organizations/{org}/automations",
            get(automations::list::<P, AR, MS>).post(automations::create::<P, AR, MS>),
        )
        .route(
            "/organizations/{org}/automations/{id}",
            get(automations::get::<P, AR, MS>)
                .put(automations::update::<P, AR, MS>)
                .delete(automations::delete::<P, AR, MS>),
        )
        // Events
        .route("/events/stream", get(sse::stream::<P, AR, MS>))
}

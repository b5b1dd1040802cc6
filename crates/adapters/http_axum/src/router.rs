//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use chathub_app::ports::{AutomationRepository, ChannelProvider, MessageStore};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// API routes live under `/api`. A [`TraceLayer`] logs each request and
/// response through `tracing`.
pub fn build<P, AR, MS>(state: AppState<P, AR, MS>) -> Router
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

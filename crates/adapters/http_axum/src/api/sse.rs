//! Server-Sent Events stream of session lifecycle events.

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Deserialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use chathub_app::ports::{AutomationRepository, ChannelProvider, MessageStore};

use crate::state::AppState;

/// `?organization=` narrows the stream to one tenant.
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub organization: Option<String>,
}

/// `GET /api/events/stream`: session events as SSE `data:` frames.
///
/// Each frame carries one JSON-encoded session event, tagged with the event
/// kind. Slow subscribers skip what they missed instead of closing.
pub async fn stream<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let filter = query
        .organization
        .map(|org| org.trim().to_string())
        .filter(|org| !org.is_empty());
    let event_rx = state.event_bus.subscribe();
    let event_stream = BroadcastStream::new(event_rx).filter_map(move |result| match result {
        Ok(event) => {
            if filter
                .as_deref()
                .is_some_and(|org| org != event.organization_id.as_str())
            {
                return None;
            }
            match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.kind.as_str()).data(json))),
                Err(err) => {
                    tracing::warn!(%err, "failed to serialize session event for SSE stream");
                    None
                }
            }
        }
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(skipped = n, "SSE subscriber lagged, some events were dropped");
            None
        }
    });

    Sse::new(event_stream).keep_alive(KeepAlive::default())
}

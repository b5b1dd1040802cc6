//! Inbound webhook receiver.

use axum::Json;
use axum::body::{Body, to_bytes};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use chathub_app::ingestion::IngestOutcome;
use chathub_app::ports::{AutomationRepository, ChannelProvider, MessageStore};
use chathub_domain::id::OrganizationId;

use crate::state::AppState;

/// Largest webhook body read. Larger payloads are acknowledged and dropped.
pub const MAX_WEBHOOK_BYTES: usize = 4 * 1024 * 1024;

/// Acknowledgement body.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub status: &'static str,
}

/// Possible responses from the webhook endpoint.
pub enum WebhookResponse {
    Ok(Json<Ack>),
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `POST /api/organizations/:org/webhook`: receive a channel payload.
///
/// Always answers `200` so the channel does not retry: malformed or
/// oversized bodies are logged and dropped, duplicates are acknowledged.
/// Dispatch to handlers happens after the response is sent. The route must
/// disable axum's default body limit; this handler applies
/// [`MAX_WEBHOOK_BYTES`] itself.
pub async fn receive<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Path(org): Path<String>,
    body: Body,
) -> WebhookResponse
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let body = match to_bytes(body, MAX_WEBHOOK_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(organization = %org, error = %err, "webhook body dropped");
            return WebhookResponse::Ok(Json(Ack {
                status: IngestOutcome::Unrecognized.as_str(),
            }));
        }
    };

    let status = match (OrganizationId::new(&org), serde_json::from_slice::<Value>(&body)) {
        (Ok(organization_id), Ok(payload)) => {
            let outcome = state.ingestion.ingest(&organization_id, payload);
            tracing::debug!(%organization_id, outcome = outcome.as_str(), "webhook received");
            outcome.as_str()
        }
        (Err(err), _) => {
            tracing::warn!(error = %err, "webhook for invalid organization");
            IngestOutcome::Unrecognized.as_str()
        }
        (_, Err(err)) => {
            tracing::warn!(organization = %org, error = %err, "webhook body is not JSON");
            IngestOutcome::Unrecognized.as_str()
        }
    };
    WebhookResponse::Ok(Json(Ack { status }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use super::MAX_WEBHOOK_BYTES;
    use crate::testing::{TestApp, body_json};

    fn cloud_payload(id: &str, text: &str) -> Value {
        json!({
            "instanceData": { "instanceId": "inst-1" },
            "data": {
                "momment": 1_700_000_000_000_i64,
                "messageId": id,
                "phone": "5511999887777",
                "fromMe": false,
                "text": { "message": text }
            }
        })
    }

    #[tokio::test]
    async fn should_dispatch_then_ack_duplicate() {
        let app = TestApp::new(true);

        let first = app
            .post_json("/api/organizations/acme/webhook", &cloud_payload("cloud-1", "hi"))
            .await;
        let second = app
            .post_json("/api/organizations/acme/webhook", &cloud_payload("cloud-1", "hi"))
            .await;

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(body_json(first).await["status"], "dispatched");
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(body_json(second).await["status"], "duplicate");
    }

    #[tokio::test]
    async fn should_ack_garbage_with_ok() {
        let app = TestApp::new(true);

        let not_json = app
            .post_raw("/api/organizations/acme/webhook", "definitely not json")
            .await;
        let unknown = app
            .post_json("/api/organizations/acme/webhook", &json!({ "hello": "world" }))
            .await;

        assert_eq!(not_json.status(), StatusCode::OK);
        assert_eq!(body_json(not_json).await["status"], "unrecognized");
        assert_eq!(unknown.status(), StatusCode::OK);
        assert_eq!(body_json(unknown).await["status"], "unrecognized");
    }

    #[tokio::test]
    async fn should_accept_payloads_above_default_body_limit() {
        let app = TestApp::new(true);
        let long_text = "a".repeat(3 * 1024 * 1024);

        let response = app
            .post_json(
                "/api/organizations/acme/webhook",
                &cloud_payload("cloud-big", &long_text),
            )
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "dispatched");
    }

    #[tokio::test]
    async fn should_ack_oversized_body_with_ok() {
        let app = TestApp::new(true);
        let oversized = "x".repeat(MAX_WEBHOOK_BYTES + 1);

        let response = app.post_raw("/api/organizations/acme/webhook", &oversized).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "unrecognized");
    }

    #[tokio::test]
    async fn should_persist_webhook_message_to_inbox() {
        let app = TestApp::new(true);

        app.post_json(
            "/api/organizations/acme/webhook",
            &json!({
                "momment": 1_700_000_000_000_i64,
                "messageId": "flat-1",
                "phone": "5511999887777",
                "fromMe": false,
                "text": { "message": "bom dia" }
            }),
        )
        .await;
        app.settle().await;

        let inbox: Value = body_json(app.get("/api/organizations/acme/inbox").await).await;
        assert_eq!(inbox.as_array().map(Vec::len), Some(1));
        assert_eq!(inbox[0]["body"], "bom dia");
        assert_eq!(inbox[0]["channelMessageId"], "flat-1");
    }
}

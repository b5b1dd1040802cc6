//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use chathub_domain::error::ChatHubError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`ChatHubError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(ChatHubError);

impl From<ChatHubError> for ApiError {
    fn from(err: ChatHubError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ChatHubError::Validation(_) | ChatHubError::MalformedWebhook(_) => {
                StatusCode::BAD_REQUEST
            }
            ChatHubError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatHubError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ChatHubError::CapacityExceeded(_) => StatusCode::SERVICE_UNAVAILABLE,
            ChatHubError::NotReady(_) | ChatHubError::Provider(_) | ChatHubError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            ChatHubError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                "internal server error".to_string()
            }
            ChatHubError::Provider(err) => {
                tracing::warn!(error = %err, "provider error");
                err.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chathub_domain::error::{
        CapacityError, NotReadyError, ProviderError, TimeoutError, ValidationError,
    };
    use chathub_domain::session::SessionStatus;
    use std::time::Duration;

    fn status_of(err: impl Into<ChatHubError>) -> StatusCode {
        ApiError::from(err.into()).into_response().status()
    }

    #[test]
    fn should_map_errors_to_status_codes() {
        assert_eq!(status_of(ValidationError::EmptyBody), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(NotReadyError {
                organization_id: "acme".to_string(),
                status: SessionStatus::AwaitingQrScan,
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ProviderError::fatal("boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(TimeoutError {
                operation: "contacts",
                after: Duration::from_secs(30),
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(CapacityError { limit: 1 }),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn should_hide_storage_details() {
        let err = ChatHubError::Storage(Box::new(std::io::Error::other("disk on fire")));
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

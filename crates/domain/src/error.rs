//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`ChatHubError`] via `#[from]`. Adapters wrap their IO failures in
//! [`ChatHubError::Storage`].

use std::time::Duration;

use crate::session::SessionStatus;

/// Top-level error shared by every port and service.
#[derive(Debug, thiserror::Error)]
pub enum ChatHubError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    #[error("{0}")]
    NotReady(#[from] NotReadyError),

    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("malformed webhook: {0}")]
    MalformedWebhook(#[from] MalformedWebhookError),

    #[error("{0}")]
    CapacityExceeded(#[from] CapacityError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("organization id must not be empty")]
    EmptyOrganizationId,
    #[error("destination address must not be empty")]
    EmptyAddress,
    #[error("destination address {0:?} contains invalid characters")]
    InvalidAddress(String),
    #[error("message body must not be empty")]
    EmptyBody,
    #[error("name must not be empty")]
    EmptyName,
    #[error("keyword rules need at least one non-blank keyword")]
    NoKeywords,
    #[error("response message must not be empty")]
    EmptyResponse,
    #[error("limit must be between {min} and {max}, got {value}")]
    LimitOutOfRange { value: usize, min: usize, max: usize },
}

/// A lookup that found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// An operation that needs a paired session ran while the session was in
/// another state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("session for organization {organization_id} is not ready (status: {status})")]
pub struct NotReadyError {
    pub organization_id: String,
    pub status: SessionStatus,
}

/// An operation exceeded its time bound.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} timed out after {after:?}")]
pub struct TimeoutError {
    pub operation: &'static str,
    pub after: Duration,
}

/// Whether retrying a failed provider call can succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Network hiccup, rate limit, provider 5xx.
    Transient,
    /// Rejected credentials, unknown chat, malformed request.
    Fatal,
}

/// The underlying channel rejected an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Transient,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Fatal,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind == ProviderErrorKind::Transient
    }
}

/// An inbound payload matched none of the known webhook shapes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct MalformedWebhookError {
    pub reason: String,
}

/// The configured session ceiling is reached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("maximum of {limit} concurrent sessions reached")]
pub struct CapacityError {
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_classify_transient_provider_errors() {
        assert!(ProviderError::transient("503").is_transient());
        assert!(!ProviderError::fatal("401").is_transient());
    }

    #[test]
    fn should_convert_sub_errors_into_chathub_error() {
        let err: ChatHubError = ValidationError::EmptyBody.into();
        assert!(matches!(err, ChatHubError::Validation(ValidationError::EmptyBody)));

        let err: ChatHubError = ProviderError::fatal("auth rejected").into();
        assert!(matches!(err, ChatHubError::Provider(_)));
    }

    #[test]
    fn should_render_not_ready_with_status() {
        let err = NotReadyError {
            organization_id: "org-1".to_string(),
            status: SessionStatus::AwaitingQrScan,
        };
        assert_eq!(
            err.to_string(),
            "session for organization org-1 is not ready (status: awaiting_qr_scan)"
        );
    }

    #[test]
    fn should_render_limit_out_of_range() {
        let err = ValidationError::LimitOutOfRange {
            value: 0,
            min: 1,
            max: 1000,
        };
        assert_eq!(err.to_string(), "limit must be between 1 and 1000, got 0");
    }
}

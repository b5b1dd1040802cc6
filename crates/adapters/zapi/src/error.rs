//! Z-API specific error type.

use chathub_domain::error::ProviderError;

/// Errors raised while talking to Z-API.
#[derive(Debug, thiserror::Error)]
pub enum ZapiError {
    /// The request never got an HTTP response.
    #[error("z-api transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Z-API answered with a non-success status.
    #[error("z-api answered {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("z-api response could not be decoded: {0}")]
    Decode(String),

    /// No instance is configured for the organization.
    #[error("no z-api instance configured for organization {0}")]
    UnknownOrganization(String),
}

impl ZapiError {
    /// Rate limiting, server errors and transport failures are worth
    /// retrying; everything else is not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::UnknownOrganization(_) => false,
        }
    }
}

impl From<ZapiError> for ProviderError {
    fn from(err: ZapiError) -> Self {
        if err.is_transient() {
            Self::transient(err.to_string())
        } else {
            Self::fatal(err.to_string())
        }
    }
}

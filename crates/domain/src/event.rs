//! Session events: notifications published whenever a session changes
//! status.

use serde::{Deserialize, Serialize};

use crate::id::{EventId, OrganizationId};
use crate::session::SessionStatus;
use crate::time::{Timestamp, now};

/// What happened to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    Connecting,
    QrGenerated,
    Authenticated,
    Ready,
    AuthFailure,
    Disconnected,
}

impl SessionEventKind {
    /// Wire name, as serialized.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::QrGenerated => "qr_generated",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::AuthFailure => "auth_failure",
            Self::Disconnected => "disconnected",
        }
    }
}

/// A status change of one organization's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    pub id: EventId,
    pub organization_id: OrganizationId,
    pub kind: SessionEventKind,
    pub status: SessionStatus,
    pub detail: Option<String>,
    pub timestamp: Timestamp,
}

impl SessionEvent {
    /// Create an event stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(
        organization_id: OrganizationId,
        kind: SessionEventKind,
        status: SessionStatus,
        detail: Option<String>,
    ) -> Self {
        Self {
            id: EventId::new(),
            organization_id,
            kind,
            status,
            detail,
            timestamp: now(),
        }
    }
}

//! Session: the lifecycle of one organization's channel connection.
//!
//! A [`SessionState`] moves through a fixed graph of [`SessionStatus`]
//! values driven by [`Transition`]s. Transitions that are not edges of the
//! graph leave the state untouched and report `false` from
//! [`SessionState::apply`].

use serde::{Deserialize, Serialize};

use crate::id::OrganizationId;
use crate::time::Timestamp;

/// Where a session currently sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No connection was ever requested for the organization.
    Uninitialized,
    /// The provider session is being opened.
    Connecting,
    /// A pairing code was issued and waits to be scanned.
    AwaitingQrScan,
    /// Paired and able to send and receive.
    Ready,
    /// Torn down explicitly or dropped by the provider.
    Disconnected,
    /// Authentication failed or the handshake timed out.
    Failed,
}

impl SessionStatus {
    /// `true` for the states a running worker owns.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::AwaitingQrScan | Self::Ready)
    }

    /// `true` while pairing is still in progress.
    #[must_use]
    pub fn is_handshaking(self) -> bool {
        matches!(self, Self::Connecting | Self::AwaitingQrScan)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::AwaitingQrScan => "awaiting_qr_scan",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
        })
    }
}

/// An input to the session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Start (or restart) a connection.
    Connect,
    /// The provider issued a fresh pairing code.
    QrIssued(String),
    /// Pairing succeeded at the given instant.
    Authenticated(Timestamp),
    /// Pairing was rejected or the handshake ceiling elapsed.
    Fail(String),
    /// The provider reported the connection gone.
    Drop(String),
    /// Explicit disconnect.
    Teardown,
}

/// Authoritative state of one organization's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub organization_id: OrganizationId,
    pub status: SessionStatus,
    pub qr_code: Option<String>,
    pub ready_since: Option<Timestamp>,
    pub last_error: Option<String>,
}

impl SessionState {
    /// A session that was never connected.
    #[must_use]
    pub fn uninitialized(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            status: SessionStatus::Uninitialized,
            qr_code: None,
            ready_since: None,
            last_error: None,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == SessionStatus::Ready
    }

    #[must_use]
    pub fn has_qr(&self) -> bool {
        self.qr_code.is_some()
    }

    /// Apply a transition. Returns `false` and changes nothing when the
    /// transition is not allowed from the current status.
    pub fn apply(&mut self, transition: Transition) -> bool {
        use SessionStatus as S;

        match (self.status, transition) {
            (S::Uninitialized | S::Disconnected | S::Failed, Transition::Connect) => {
                self.status = S::Connecting;
                self.qr_code = None;
                self.ready_since = None;
                self.last_error = None;
            }
            (S::Connecting | S::AwaitingQrScan, Transition::QrIssued(code)) => {
                self.status = S::AwaitingQrScan;
                self.qr_code = Some(code);
            }
            (S::Connecting | S::AwaitingQrScan, Transition::Authenticated(at)) => {
                self.status = S::Ready;
                self.qr_code = None;
                self.ready_since = Some(at);
            }
            (S::Connecting | S::AwaitingQrScan, Transition::Fail(reason)) => {
                self.status = S::Failed;
                self.qr_code = None;
                self.last_error = Some(reason);
            }
            (S::Connecting | S::AwaitingQrScan | S::Ready, Transition::Drop(reason)) => {
                self.status = S::Disconnected;
                self.qr_code = None;
                self.ready_since = None;
                self.last_error = Some(reason);
            }
            (S::Connecting | S::AwaitingQrScan | S::Ready | S::Failed, Transition::Teardown) => {
                self.status = S::Disconnected;
                self.qr_code = None;
                self.ready_since = None;
            }
            _ => return false,
        }
        true
    }
}

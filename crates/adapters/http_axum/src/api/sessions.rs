//! Session lifecycle handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use chathub_app::ports::{AutomationRepository, ChannelProvider, MessageStore};
use chathub_domain::error::{ChatHubError, NotFoundError};
use chathub_domain::session::{SessionState, SessionStatus};

use crate::api::organization;
use crate::error::ApiError;
use crate::state::AppState;

/// Session state plus the two flags clients branch on.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    #[serde(flatten)]
    pub state: SessionState,
    pub is_ready: bool,
    #[serde(rename = "hasQR")]
    pub has_qr: bool,
}

impl From<SessionState> for StatusBody {
    fn from(state: SessionState) -> Self {
        Self {
            is_ready: state.is_ready(),
            has_qr: state.has_qr(),
            state,
        }
    }
}

/// Current pairing code.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrBody {
    pub qr_code: Option<String>,
    pub status: SessionStatus,
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<StatusBody>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the connect, status and disconnect endpoints.
pub enum StatusResponse {
    Ok(Json<StatusBody>),
}

impl IntoResponse for StatusResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the QR endpoint.
pub enum QrResponse {
    Ok(Json<QrBody>),
}

impl IntoResponse for QrResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/sessions`: every known session.
pub async fn list<P, AR, MS>(State(state): State<AppState<P, AR, MS>>) -> ListResponse
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let sessions = state
        .registry
        .list()
        .into_iter()
        .map(StatusBody::from)
        .collect();
    ListResponse::Ok(Json(sessions))
}

/// `POST /api/organizations/:org/connect`: start the handshake.
pub async fn connect<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Path(org): Path<String>,
) -> Result<StatusResponse, ApiError>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let organization_id = organization(&org)?;
    let session = state.registry.connect(&organization_id).await?;
    Ok(StatusResponse::Ok(Json(session.into())))
}

/// `GET /api/organizations/:org/status`: current session state.
pub async fn status<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Path(org): Path<String>,
) -> Result<StatusResponse, ApiError>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let organization_id = organization(&org)?;
    Ok(StatusResponse::Ok(Json(
        state.registry.get(&organization_id).into(),
    )))
}

/// `GET /api/organizations/:org/qr`: the live pairing code. 404 when there
/// is none and the session is not ready.
pub async fn qr<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Path(org): Path<String>,
) -> Result<QrResponse, ApiError>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let organization_id = organization(&org)?;
    let session = state.registry.get(&organization_id);
    if session.qr_code.is_none() && !session.is_ready() {
        return Err(ChatHubError::from(NotFoundError {
            entity: "QrCode",
            id: organization_id.to_string(),
        })
        .into());
    }
    Ok(QrResponse::Ok(Json(QrBody {
        qr_code: session.qr_code,
        status: session.status,
    })))
}

/// `POST /api/organizations/:org/disconnect`: tear the session down.
pub async fn disconnect<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Path(org): Path<String>,
) -> Result<StatusResponse, ApiError>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let organization_id = organization(&org)?;
    let session = state.registry.disconnect(&organization_id).await?;
    Ok(StatusResponse::Ok(Json(session.into())))
}

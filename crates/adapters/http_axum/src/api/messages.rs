//! Sending and reading messages.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use chathub_app::ports::{AutomationRepository, ChannelProvider, MessageStore};
use chathub_domain::error::ChatHubError;
use chathub_domain::message::{
    ChannelMessage, Contact, InboundMessageEvent, OutboundSendRequest, SendReceipt, read_limit,
};

use crate::api::organization;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for sending a text message.
///
/// Missing fields are reported as validation errors rather than rejected
/// by the extractor.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendRequest {
    #[serde(alias = "toAddress")]
    pub to: String,
    #[serde(alias = "message")]
    pub body: String,
}

/// `?limit=` of the read endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// Possible responses from the send endpoint.
pub enum SendResponse {
    Ok(Json<SendReceipt>),
}

impl IntoResponse for SendResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the contacts endpoint.
pub enum ContactsResponse {
    Ok(Json<Vec<Contact>>),
}

impl IntoResponse for ContactsResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the channel message endpoints.
pub enum MessagesResponse {
    Ok(Json<Vec<ChannelMessage>>),
}

impl IntoResponse for MessagesResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the inbox endpoint.
pub enum InboxResponse {
    Ok(Json<Vec<InboundMessageEvent>>),
}

impl IntoResponse for InboxResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `POST /api/organizations/:org/send`: send a text message.
pub async fn send<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Path(org): Path<String>,
    Json(req): Json<SendRequest>,
) -> Result<SendResponse, ApiError>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let organization_id = organization(&org)?;
    let request =
        OutboundSendRequest::new(organization_id, &req.to, req.body).map_err(ChatHubError::from)?;
    let receipt = state.registry.send(request).await?;
    Ok(SendResponse::Ok(Json(receipt)))
}

/// `GET /api/organizations/:org/contacts`: contacts of the paired phone.
pub async fn contacts<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Path(org): Path<String>,
) -> Result<ContactsResponse, ApiError>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let organization_id = organization(&org)?;
    let contacts = state.registry.contacts(&organization_id).await?;
    Ok(ContactsResponse::Ok(Json(contacts)))
}

/// `GET /api/organizations/:org/messages?limit=`: recent messages across
/// chats, newest first.
pub async fn recent<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Path(org): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<MessagesResponse, ApiError>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let organization_id = organization(&org)?;
    let messages = state.registry.messages(&organization_id, query.limit).await?;
    Ok(MessagesResponse::Ok(Json(messages)))
}

/// `GET /api/organizations/:org/messages/:chat_id?limit=`: recent messages
/// of one chat.
pub async fn chat<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Path((org, chat_id)): Path<(String, String)>,
    Query(query): Query<LimitQuery>,
) -> Result<MessagesResponse, ApiError>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let organization_id = organization(&org)?;
    let messages = state
        .registry
        .chat_messages(&organization_id, &chat_id, query.limit)
        .await?;
    Ok(MessagesResponse::Ok(Json(messages)))
}

/// `GET /api/organizations/:org/inbox?limit=`: persisted inbound events,
/// newest first. Available whatever the session status.
pub async fn inbox<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Path(org): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<InboxResponse, ApiError>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let organization_id = organization(&org)?;
    let limit = read_limit(query.limit).map_err(ChatHubError::from)?;
    let events = state
        .message_store
        .list_recent(&organization_id, limit)
        .await?;
    Ok(InboxResponse::Ok(Json(events)))
}

//! Inbound webhook payload shapes.
//!
//! Providers post messages in one of two structures:
//!
//! - **cloud**: `{ "instanceData": {…}, "data": { "momment": …, "text": … } }`
//! - **flat**: `{ "momment": …, "text": … }`
//!
//! [`WebhookPayload::parse`] tries them in that order and falls back to
//! [`WebhookPayload::Unrecognized`]; parsing never fails.

use serde::Deserialize;
use serde_json::Value;

use crate::id::OrganizationId;
use crate::message::{Direction, InboundMessageEvent};

/// Message text, either a plain string or `{ "message": "…" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TextContent {
    Plain(String),
    Wrapped { message: String },
}

impl TextContent {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain(s) | Self::Wrapped { message: s } => s,
        }
    }
}

/// Fields common to both payload shapes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFields {
    pub momment: i64,
    #[serde(default)]
    pub text: Option<TextContent>,
    #[serde(default)]
    pub body: Option<TextContent>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub connected_phone: Option<String>,
    #[serde(default)]
    pub from_me: bool,
}

impl MessageFields {
    /// Message text, preferring `text` over `body`.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.text
            .as_ref()
            .or(self.body.as_ref())
            .map(TextContent::as_str)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudEnvelope {
    #[allow(dead_code)]
    instance_data: Value,
    data: MessageFields,
}

/// A raw webhook body classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookPayload {
    Cloud(MessageFields),
    Flat(MessageFields),
    Unrecognized(Value),
}

impl WebhookPayload {
    /// Classify a raw payload. Shapes missing a timestamp or any content
    /// field fall through to the next attempt.
    #[must_use]
    pub fn parse(raw: Value) -> Self {
        if let Ok(envelope) = serde_json::from_value::<CloudEnvelope>(raw.clone())
            && envelope.data.content().is_some()
        {
            return Self::Cloud(envelope.data);
        }
        if let Ok(fields) = serde_json::from_value::<MessageFields>(raw.clone())
            && fields.content().is_some()
        {
            return Self::Flat(fields);
        }
        Self::Unrecognized(raw)
    }

    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Cloud(_) => "cloud",
            Self::Flat(_) => "flat",
            Self::Unrecognized(_) => "unrecognized",
        }
    }

    /// Map a recognized payload onto the canonical event.
    ///
    /// `generate_id` is called only when the payload carries neither
    /// `messageId` nor `id`.
    pub fn into_event(
        self,
        organization_id: OrganizationId,
        generate_id: impl FnOnce() -> String,
    ) -> Option<InboundMessageEvent> {
        let fields = match self {
            Self::Cloud(fields) | Self::Flat(fields) => fields,
            Self::Unrecognized(_) => return None,
        };
        let body = fields.content().unwrap_or_default().to_string();
        let peer = fields
            .phone
            .clone()
            .or_else(|| fields.from.clone())
            .or_else(|| fields.sender.clone())
            .unwrap_or_default();
        let (from_address, to_address, direction) = if fields.from_me {
            ("me".to_string(), peer, Direction::Outbound)
        } else {
            let own = fields
                .connected_phone
                .or(fields.to)
                .unwrap_or_else(|| "me".to_string());
            (peer, own, Direction::Inbound)
        };
        let channel_message_id = fields
            .message_id
            .or(fields.id)
            .unwrap_or_else(generate_id);

        Some(InboundMessageEvent::new(
            organization_id,
            channel_message_id,
            from_address,
            to_address,
            body,
            fields.momment,
            direction,
        ))
    }
}

//! Messages: canonical inbound events, outbound send requests, and the
//! read models returned by a paired channel.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::OrganizationId;

/// Channel address suffix for individual chats.
pub const ADDRESS_SUFFIX: &str = "@c.us";

/// Whether a message was received from a peer or sent by the organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        })
    }
}

/// The one canonical shape every inbound provider payload is normalized to.
///
/// Values are built only by webhook parsing
/// ([`WebhookPayload::into_event`](crate::webhook::WebhookPayload::into_event))
/// and are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessageEvent {
    organization_id: OrganizationId,
    channel_message_id: String,
    from_address: String,
    to_address: String,
    body: String,
    timestamp: i64,
    direction: Direction,
}

impl InboundMessageEvent {
    pub(crate) fn new(
        organization_id: OrganizationId,
        channel_message_id: String,
        from_address: String,
        to_address: String,
        body: String,
        timestamp: i64,
        direction: Direction,
    ) -> Self {
        Self {
            organization_id,
            channel_message_id,
            from_address,
            to_address,
            body,
            timestamp,
            direction,
        }
    }

    #[must_use]
    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    #[must_use]
    pub fn channel_message_id(&self) -> &str {
        &self.channel_message_id
    }

    #[must_use]
    pub fn from_address(&self) -> &str {
        &self.from_address
    }

    #[must_use]
    pub fn to_address(&self) -> &str {
        &self.to_address
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Provider timestamp, milliseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// A validated request to send a text message through an organization's
/// session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundSendRequest {
    organization_id: OrganizationId,
    to_address: String,
    body: String,
}

impl OutboundSendRequest {
    /// Validate the body and normalize the destination to the channel
    /// address format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the address or body is empty, or
    /// when a bare phone number contains anything but digits and the usual
    /// separators.
    pub fn new(
        organization_id: OrganizationId,
        to: &str,
        body: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(ValidationError::EmptyBody);
        }
        let to_address = normalize_address(to)?;
        Ok(Self {
            organization_id,
            to_address,
            body,
        })
    }

    #[must_use]
    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    #[must_use]
    pub fn to_address(&self) -> &str {
        &self.to_address
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Normalize a destination to `<digits>@c.us`. Addresses that already
/// carry a domain (`…@c.us`, `…@g.us`) are kept as-is.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyAddress`] or
/// [`ValidationError::InvalidAddress`].
pub fn normalize_address(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyAddress);
    }
    if trimmed.contains('@') {
        return Ok(trimmed.to_string());
    }
    let digits: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | '+' | '-' | '(' | ')' | '.'))
        .collect();
    if digits.is_empty() {
        return Err(ValidationError::EmptyAddress);
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidAddress(trimmed.to_string()));
    }
    Ok(format!("{digits}{ADDRESS_SUFFIX}"))
}

/// Phone-number part of a channel address (`5511999@c.us` → `5511999`).
#[must_use]
pub fn address_phone(address: &str) -> &str {
    address.split_once('@').map_or(address, |(phone, _)| phone)
}

/// Provider acknowledgement of a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub message_id: String,
}

/// A contact known to a paired channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub pushname: String,
    pub number: String,
    pub is_my_contact: bool,
}

/// A message read back from a paired channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    pub id: String,
    pub from: String,
    pub to: String,
    pub body: String,
    pub timestamp: i64,
    pub is_from_me: bool,
}

/// Default number of messages returned by channel reads.
pub const DEFAULT_READ_LIMIT: usize = 50;
/// Upper bound accepted for channel reads.
pub const MAX_READ_LIMIT: usize = 1000;

/// Resolve an optional caller-supplied limit into the accepted range.
///
/// # Errors
///
/// Returns [`ValidationError::LimitOutOfRange`] for `0` or values above
/// [`MAX_READ_LIMIT`].
pub fn read_limit(requested: Option<usize>) -> Result<usize, ValidationError> {
    match requested {
        None => Ok(DEFAULT_READ_LIMIT),
        Some(value) if (1..=MAX_READ_LIMIT).contains(&value) => Ok(value),
        Some(value) => Err(ValidationError::LimitOutOfRange {
            value,
            min: 1,
            max: MAX_READ_LIMIT,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org() -> OrganizationId {
        OrganizationId::new("org-1").unwrap()
    }

    #[test]
    fn should_append_suffix_to_bare_phone_numbers() {
        let req = OutboundSendRequest::new(org(), "+55 (11) 99988-7777", "hello").unwrap();
        assert_eq!(req.to_address(), "5511999887777@c.us");
        assert_eq!(req.body(), "hello");
    }

    #[test]
    fn should_keep_addresses_that_already_have_a_domain() {
        let req = OutboundSendRequest::new(org(), "5511999887777@c.us", "hi").unwrap();
        assert_eq!(req.to_address(), "5511999887777@c.us");

        let group = OutboundSendRequest::new(org(), "120363@g.us", "hi").unwrap();
        assert_eq!(group.to_address(), "120363@g.us");
    }

    #[test]
    fn should_reject_empty_body() {
        let err = OutboundSendRequest::new(org(), "5511", "   ").unwrap_err();
        assert_eq!(err, ValidationError::EmptyBody);
    }

    #[test]
    fn should_reject_empty_or_invalid_address() {
        assert_eq!(normalize_address("  "), Err(ValidationError::EmptyAddress));
        assert_eq!(normalize_address("+ -"), Err(ValidationError::EmptyAddress));
        assert!(matches!(
            normalize_address("call-me-maybe"),
            Err(ValidationError::InvalidAddress(_))
        ));
    }

    #[test]
    fn should_extract_phone_from_address() {
        assert_eq!(address_phone("5511@c.us"), "5511");
        assert_eq!(address_phone("5511"), "5511");
    }

    #[test]
    fn should_default_and_bound_read_limit() {
        assert_eq!(read_limit(None), Ok(DEFAULT_READ_LIMIT));
        assert_eq!(read_limit(Some(1)), Ok(1));
        assert_eq!(read_limit(Some(1000)), Ok(1000));
        assert!(read_limit(Some(0)).is_err());
        assert!(read_limit(Some(1001)).is_err());
    }
}

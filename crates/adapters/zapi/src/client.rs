//! Thin typed wrapper over the Z-API REST endpoints of one instance.

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use chathub_domain::message::{ADDRESS_SUFFIX, ChannelMessage, Contact, SendReceipt, address_phone};
use chathub_domain::webhook::MessageFields;

use crate::config::ZapiInstance;
use crate::error::ZapiError;

/// Chats sampled when reading messages across all chats.
const RECENT_CHATS: usize = 20;
/// Messages fetched per sampled chat.
const MESSAGES_PER_CHAT: usize = 5;

#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    pub(crate) connected: bool,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QrCodeResponse {
    value: String,
}

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    phone: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendTextResponse {
    #[serde(default)]
    zaap_id: Option<String>,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContactResponse {
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    short: Option<String>,
    #[serde(default)]
    vname: Option<String>,
}

impl ContactResponse {
    fn into_contact(self) -> Option<Contact> {
        let number = self.phone.filter(|phone| !phone.is_empty())?;
        let name = self
            .vname
            .clone()
            .or(self.name)
            .or_else(|| self.short.clone())
            .unwrap_or_else(|| number.clone());
        let pushname = self.short.or(self.vname).unwrap_or_default();
        Some(Contact {
            id: format!("{number}{ADDRESS_SUFFIX}"),
            name,
            pushname,
            number,
            is_my_contact: true,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    phone: String,
}

fn channel_message(fields: MessageFields, chat_phone: &str) -> ChannelMessage {
    let peer = fields
        .phone
        .clone()
        .or_else(|| fields.from.clone())
        .or_else(|| fields.sender.clone())
        .unwrap_or_else(|| chat_phone.to_string());
    let body = fields.content().unwrap_or_default().to_string();
    let (from, to) = if fields.from_me {
        ("me".to_string(), peer)
    } else {
        (peer, "me".to_string())
    };
    ChannelMessage {
        id: fields.message_id.or(fields.id).unwrap_or_default(),
        from,
        to,
        body,
        timestamp: fields.momment,
        is_from_me: fields.from_me,
    }
}

/// Digits Z-API expects in its `phone` fields.
fn phone_digits(address: &str) -> String {
    address_phone(address)
        .chars()
        .filter(char::is_ascii_digit)
        .collect()
}

/// Client bound to one Z-API instance.
#[derive(Debug, Clone)]
pub struct ZapiClient {
    http: reqwest::Client,
    instance_url: String,
    client_token: Option<String>,
}

impl ZapiClient {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        instance: &ZapiInstance,
        client_token: Option<String>,
    ) -> Self {
        Self {
            http,
            instance_url: format!(
                "{}/instances/{}/token/{}",
                base_url.trim_end_matches('/'),
                instance.instance_id,
                instance.token
            ),
            client_token,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{path}", self.instance_url))
            .header("Accept", "application/json");
        match &self.client_token {
            Some(token) => builder.header("Client-Token", token),
            None => builder,
        }
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, ZapiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ZapiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|err| ZapiError::Decode(err.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ZapiError> {
        tracing::trace!(path, "z-api GET");
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(ZapiError::Transport)?;
        Self::read(response).await
    }

    /// Connection status of the instance.
    ///
    /// # Errors
    ///
    /// Any [`ZapiError`].
    pub(crate) async fn status(&self) -> Result<StatusResponse, ZapiError> {
        self.get("/status").await
    }

    /// Current pairing code of the instance.
    ///
    /// # Errors
    ///
    /// Any [`ZapiError`].
    pub async fn qr_code(&self) -> Result<String, ZapiError> {
        let response: QrCodeResponse = self.get("/qr-code").await?;
        Ok(response.value)
    }

    /// Send a text message to a channel address.
    ///
    /// # Errors
    ///
    /// Any [`ZapiError`]; [`ZapiError::Decode`] when the response carries no
    /// message id.
    pub async fn send_text(&self, to: &str, message: &str) -> Result<SendReceipt, ZapiError> {
        let phone = phone_digits(to);
        let response = self
            .request(Method::POST, "/send-text")
            .json(&SendTextRequest {
                phone: &phone,
                message,
            })
            .send()
            .await
            .map_err(ZapiError::Transport)?;
        let sent: SendTextResponse = Self::read(response).await?;
        sent.message_id
            .or(sent.id)
            .or(sent.zaap_id)
            .map(|message_id| SendReceipt { message_id })
            .ok_or_else(|| {
                ZapiError::Decode("send-text response carries no message id".to_string())
            })
    }

    /// Contacts of the paired phone.
    ///
    /// # Errors
    ///
    /// Any [`ZapiError`].
    pub async fn contacts(&self) -> Result<Vec<Contact>, ZapiError> {
        let contacts: Vec<ContactResponse> = self.get("/contacts?page=1&pageSize=100").await?;
        Ok(contacts
            .into_iter()
            .filter_map(ContactResponse::into_contact)
            .collect())
    }

    /// Most recent messages of one chat, newest first.
    ///
    /// # Errors
    ///
    /// Any [`ZapiError`].
    pub async fn chat_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ZapiError> {
        let phone = phone_digits(chat_id);
        let fields: Vec<MessageFields> = self
            .get(&format!("/chat-messages/{phone}?amount={limit}"))
            .await?;
        let mut messages: Vec<ChannelMessage> = fields
            .into_iter()
            .map(|f| channel_message(f, &phone))
            .collect();
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        messages.truncate(limit);
        Ok(messages)
    }

    /// Most recent messages across the latest chats, newest first.
    ///
    /// # Errors
    ///
    /// Any [`ZapiError`] of the chat listing. Failures on single chats are
    /// logged and skipped.
    pub async fn recent_messages(&self, limit: usize) -> Result<Vec<ChannelMessage>, ZapiError> {
        let chats: Vec<ChatResponse> = self
            .get(&format!("/chats?page=1&pageSize={RECENT_CHATS}"))
            .await?;
        let mut messages = Vec::new();
        for chat in chats {
            match self.chat_messages(&chat.phone, MESSAGES_PER_CHAT).await {
                Ok(found) => messages.extend(found),
                Err(err) => tracing::debug!(chat = %chat.phone, error = %err, "skipping chat"),
            }
        }
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        messages.truncate(limit);
        Ok(messages)
    }

    /// Log the phone out of the instance.
    ///
    /// # Errors
    ///
    /// Any [`ZapiError`].
    pub async fn disconnect(&self) -> Result<(), ZapiError> {
        let _: serde_json::Value = self.get("/disconnect").await?;
        Ok(())
    }
}

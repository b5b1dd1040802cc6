//! Webhook normalizer: turns raw provider payloads into canonical
//! [`InboundMessageEvent`]s and suppresses redeliveries.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use chathub_domain::id::OrganizationId;
use chathub_domain::message::InboundMessageEvent;
use chathub_domain::webhook::WebhookPayload;

/// Default redelivery window.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Result of normalizing one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Event(InboundMessageEvent),
    /// Same `(organization, message id)` already seen inside the window.
    Duplicate,
    /// No known shape matched; the payload was logged and dropped.
    Unrecognized,
}

type DedupKey = (OrganizationId, String);

/// Ids seen inside the window. `order` is oldest first, so expired entries
/// are always at its front.
#[derive(Debug, Default)]
struct SeenIds {
    order: VecDeque<(DedupKey, Instant)>,
    index: HashMap<DedupKey, Instant>,
}

impl SeenIds {
    fn prune(&mut self, now: Instant, window: Duration) {
        while self
            .order
            .front()
            .is_some_and(|(_, first_seen)| now.duration_since(*first_seen) >= window)
        {
            if let Some((key, _)) = self.order.pop_front() {
                self.index.remove(&key);
            }
        }
    }

    /// Returns `false` when the key is already tracked.
    fn insert(&mut self, key: DedupKey, now: Instant) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key.clone(), now);
        self.order.push_back((key, now));
        true
    }
}

/// Stateless parsing plus a sliding-window dedup set.
#[derive(Debug)]
pub struct WebhookNormalizer {
    window: Duration,
    seen: Mutex<SeenIds>,
}

impl Default for WebhookNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_WINDOW)
    }
}

impl WebhookNormalizer {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(SeenIds::default()),
        }
    }

    /// Normalize one raw payload for `organization_id`. Never fails.
    pub fn normalize(&self, organization_id: &OrganizationId, raw: Value) -> Normalized {
        let payload = WebhookPayload::parse(raw);
        let shape = payload.shape();
        if let WebhookPayload::Unrecognized(raw) = &payload {
            tracing::warn!(
                %organization_id,
                payload = %truncate(&raw.to_string(), 512),
                "dropping unrecognized webhook payload"
            );
            return Normalized::Unrecognized;
        }

        let Some(event) = payload.into_event(organization_id.clone(), || {
            uuid::Uuid::new_v4().to_string()
        }) else {
            return Normalized::Unrecognized;
        };

        if self.is_redelivery(organization_id, event.channel_message_id()) {
            tracing::debug!(
                %organization_id,
                message_id = event.channel_message_id(),
                "duplicate webhook delivery suppressed"
            );
            return Normalized::Duplicate;
        }

        tracing::debug!(
            %organization_id,
            shape,
            message_id = event.channel_message_id(),
            direction = %event.direction(),
            "webhook normalized"
        );
        Normalized::Event(event)
    }

    /// Record the id and report whether it was already seen inside the
    /// window. Expired entries are pruned on the way.
    fn is_redelivery(&self, organization_id: &OrganizationId, message_id: &str) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.prune(now, self.window);
        !seen.insert((organization_id.clone(), message_id.to_string()), now)
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .index
            .len()
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

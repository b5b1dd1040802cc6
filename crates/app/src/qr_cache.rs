//! Short-lived per-organization store of the current pairing code.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use chathub_domain::id::OrganizationId;

#[derive(Debug, Clone)]
struct Entry {
    code: String,
    expires_at: Instant,
}

/// Pairing codes keyed by organization. Expired codes are invisible to
/// readers and removed on the next access.
#[derive(Debug, Default)]
pub struct QrCodeCache {
    entries: DashMap<OrganizationId, Entry>,
}

impl QrCodeCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current code, if one was stored and has not expired.
    #[must_use]
    pub fn get(&self, organization_id: &OrganizationId) -> Option<String> {
        let now = Instant::now();
        {
            let entry = self.entries.get(organization_id)?;
            if entry.expires_at > now {
                return Some(entry.code.clone());
            }
        }
        self.entries
            .remove_if(organization_id, |_, entry| entry.expires_at <= now);
        None
    }

    /// Store or overwrite the code and restart its expiry.
    pub fn set(&self, organization_id: &OrganizationId, code: impl Into<String>, ttl: Duration) {
        self.entries.insert(
            organization_id.clone(),
            Entry {
                code: code.into(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn clear(&self, organization_id: &OrganizationId) {
        self.entries.remove(organization_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org(name: &str) -> OrganizationId {
        OrganizationId::new(name).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn should_return_code_until_ttl_elapses() {
        let cache = QrCodeCache::new();
        cache.set(&org("a"), "qr-1", Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&org("a")).as_deref(), Some("qr-1"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&org("a")), None);
    }

    #[tokio::test(start_paused = true)]
    async fn should_reset_expiry_when_overwritten() {
        let cache = QrCodeCache::new();
        cache.set(&org("a"), "qr-1", Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(50)).await;
        cache.set(&org("a"), "qr-2", Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(cache.get(&org("a")).as_deref(), Some("qr-2"));
    }

    #[tokio::test]
    async fn should_isolate_organizations() {
        let cache = QrCodeCache::new();
        cache.set(&org("a"), "qr-a", Duration::from_secs(60));
        cache.set(&org("b"), "qr-b", Duration::from_secs(60));
        cache.clear(&org("a"));
        assert_eq!(cache.get(&org("a")), None);
        assert_eq!(cache.get(&org("b")).as_deref(), Some("qr-b"));
    }
}

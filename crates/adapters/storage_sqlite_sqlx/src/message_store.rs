//! `SQLite` implementation of [`MessageStore`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use chathub_app::ports::MessageStore;
use chathub_domain::error::ChatHubError;
use chathub_domain::id::OrganizationId;
use chathub_domain::message::InboundMessageEvent;

use crate::error::StorageError;

struct Wrapper(InboundMessageEvent);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let event_json: String = row.try_get("event")?;
        serde_json::from_str(&event_json)
            .map(Self)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))
    }
}

// Provider retries of an already stored message are dropped by the key.
const INSERT: &str = r"
    INSERT OR IGNORE INTO inbound_messages
        (organization_id, channel_message_id, direction, timestamp, event)
    VALUES (?, ?, ?, ?, ?)
";

const SELECT_RECENT: &str = r"
    SELECT event FROM inbound_messages
    WHERE organization_id = ?
    ORDER BY timestamp DESC, rowid DESC
    LIMIT ?
";

/// `SQLite`-backed inbox of normalized message events.
pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    /// Create a new message store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl MessageStore for SqliteMessageStore {
    async fn append(&self, event: InboundMessageEvent) -> Result<(), ChatHubError> {
        let event_json = serde_json::to_string(&event).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(event.organization_id().as_str())
            .bind(event.channel_message_id())
            .bind(event.direction().to_string())
            .bind(event.timestamp())
            .bind(&event_json)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn list_recent(
        &self,
        organization_id: &OrganizationId,
        limit: usize,
    ) -> Result<Vec<InboundMessageEvent>, ChatHubError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RECENT)
            .bind(organization_id.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

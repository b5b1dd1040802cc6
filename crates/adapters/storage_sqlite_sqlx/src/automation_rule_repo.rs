//! `SQLite` implementation of [`AutomationRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use chathub_app::ports::AutomationRepository;
use chathub_domain::automation::{AutomationRule, TriggerType};
use chathub_domain::error::{ChatHubError, NotFoundError};
use chathub_domain::id::{AutomationRuleId, OrganizationId};

use crate::error::StorageError;

struct Wrapper(AutomationRule);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<AutomationRule> {
        value.map(|w| w.0)
    }
}

fn decode_error(err: impl Into<sqlx::error::BoxDynError>) -> sqlx::Error {
    sqlx::Error::Decode(err.into())
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let organization_id: String = row.try_get("organization_id")?;
        let name: String = row.try_get("name")?;
        let trigger_type: String = row.try_get("trigger_type")?;
        let keywords_json: String = row.try_get("keywords")?;
        let response_message: String = row.try_get("response_message")?;
        let priority: i64 = row.try_get("priority")?;
        let is_active: bool = row.try_get("is_active")?;
        let responses_sent: i64 = row.try_get("responses_sent")?;

        let organization_id = OrganizationId::new(organization_id).map_err(decode_error)?;
        let trigger_type: TriggerType = trigger_type.parse().map_err(decode_error)?;
        let keywords: Vec<String> = serde_json::from_str(&keywords_json).map_err(decode_error)?;
        let priority = u32::try_from(priority).map_err(decode_error)?;
        let responses_sent = u64::try_from(responses_sent).map_err(decode_error)?;

        Ok(Self(AutomationRule {
            id: AutomationRuleId::from_uuid(id),
            organization_id,
            name,
            trigger_type,
            keywords,
            response_message,
            priority,
            is_active,
            responses_sent,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO automation_rules
        (id, organization_id, name, trigger_type, keywords, response_message, priority, is_active, responses_sent)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const UPDATE: &str = r"
    UPDATE automation_rules
    SET name = ?, trigger_type = ?, keywords = ?, response_message = ?, priority = ?, is_active = ?
    WHERE id = ?
";

const SELECT_BY_ID: &str = "SELECT * FROM automation_rules WHERE id = ?";
const SELECT_FOR_ORGANIZATION: &str =
    "SELECT * FROM automation_rules WHERE organization_id = ? ORDER BY priority, name";
const SELECT_ACTIVE_FOR_ORGANIZATION: &str = "SELECT * FROM automation_rules WHERE organization_id = ? AND is_active = 1 ORDER BY priority, name";
const INCREMENT_RESPONSES_SENT: &str =
    "UPDATE automation_rules SET responses_sent = responses_sent + 1 WHERE id = ?";

fn not_found(id: AutomationRuleId) -> ChatHubError {
    NotFoundError {
        entity: "AutomationRule",
        id: id.to_string(),
    }
    .into()
}

/// `SQLite`-backed automation rule repository.
pub struct SqliteAutomationRuleRepository {
    pool: SqlitePool,
}

impl SqliteAutomationRuleRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_for(
        &self,
        query: &'static str,
        organization_id: &OrganizationId,
    ) -> Result<Vec<AutomationRule>, ChatHubError> {
        let rows: Vec<Wrapper> = sqlx::query_as(query)
            .bind(organization_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

impl AutomationRepository for SqliteAutomationRuleRepository {
    async fn create(&self, rule: AutomationRule) -> Result<AutomationRule, ChatHubError> {
        let keywords_json = serde_json::to_string(&rule.keywords).map_err(StorageError::from)?;
        let responses_sent = i64::try_from(rule.responses_sent).unwrap_or(i64::MAX);

        sqlx::query(INSERT)
            .bind(rule.id.as_uuid())
            .bind(rule.organization_id.as_str())
            .bind(&rule.name)
            .bind(rule.trigger_type.to_string())
            .bind(&keywords_json)
            .bind(&rule.response_message)
            .bind(i64::from(rule.priority))
            .bind(rule.is_active)
            .bind(responses_sent)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rule)
    }

    async fn get_by_id(
        &self,
        id: AutomationRuleId,
    ) -> Result<Option<AutomationRule>, ChatHubError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn list_for(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<AutomationRule>, ChatHubError> {
        self.fetch_for(SELECT_FOR_ORGANIZATION, organization_id)
            .await
    }

    async fn list_active_for(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<AutomationRule>, ChatHubError> {
        self.fetch_for(SELECT_ACTIVE_FOR_ORGANIZATION, organization_id)
            .await
    }

    async fn update(&self, rule: AutomationRule) -> Result<AutomationRule, ChatHubError> {
        let keywords_json = serde_json::to_string(&rule.keywords).map_err(StorageError::from)?;

        let result = sqlx::query(UPDATE)
            .bind(&rule.name)
            .bind(rule.trigger_type.to_string())
            .bind(&keywords_json)
            .bind(&rule.response_message)
            .bind(i64::from(rule.priority))
            .bind(rule.is_active)
            .bind(rule.id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(not_found(rule.id));
        }
        Ok(rule)
    }

    async fn delete(&self, id: AutomationRuleId) -> Result<(), ChatHubError> {
        sqlx::query("DELETE FROM automation_rules WHERE id = ?")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn increment_responses_sent(&self, id: AutomationRuleId) -> Result<(), ChatHubError> {
        let result = sqlx::query(INCREMENT_RESPONSES_SENT)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}

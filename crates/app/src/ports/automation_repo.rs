//! Automation repository port: persistence for automation rules.

use std::future::Future;

use chathub_domain::automation::AutomationRule;
use chathub_domain::error::ChatHubError;
use chathub_domain::id::{AutomationRuleId, OrganizationId};

/// Repository for persisting and querying [`AutomationRule`]s.
pub trait AutomationRepository {
    /// Create a new rule in storage.
    fn create(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, ChatHubError>> + Send;

    /// Get a rule by its unique identifier.
    fn get_by_id(
        &self,
        id: AutomationRuleId,
    ) -> impl Future<Output = Result<Option<AutomationRule>, ChatHubError>> + Send;

    /// Get every rule of an organization.
    fn list_for(
        &self,
        organization_id: &OrganizationId,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, ChatHubError>> + Send;

    /// Get the active rules of an organization.
    fn list_active_for(
        &self,
        organization_id: &OrganizationId,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, ChatHubError>> + Send;

    /// Update an existing rule.
    fn update(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, ChatHubError>> + Send;

    /// Delete a rule by its unique identifier.
    fn delete(&self, id: AutomationRuleId)
    -> impl Future<Output = Result<(), ChatHubError>> + Send;

    /// Atomically add one to `responses_sent`.
    fn increment_responses_sent(
        &self,
        id: AutomationRuleId,
    ) -> impl Future<Output = Result<(), ChatHubError>> + Send;
}

impl<T: AutomationRepository + Send + Sync> AutomationRepository for std::sync::Arc<T> {
    fn create(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, ChatHubError>> + Send {
        (**self).create(rule)
    }

    fn get_by_id(
        &self,
        id: AutomationRuleId,
    ) -> impl Future<Output = Result<Option<AutomationRule>, ChatHubError>> + Send {
        (**self).get_by_id(id)
    }

    fn list_for(
        &self,
        organization_id: &OrganizationId,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, ChatHubError>> + Send {
        (**self).list_for(organization_id)
    }

    fn list_active_for(
        &self,
        organization_id: &OrganizationId,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, ChatHubError>> + Send {
        (**self).list_active_for(organization_id)
    }

    fn update(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, ChatHubError>> + Send {
        (**self).update(rule)
    }

    fn delete(
        &self,
        id: AutomationRuleId,
    ) -> impl Future<Output = Result<(), ChatHubError>> + Send {
        (**self).delete(id)
    }

    fn increment_responses_sent(
        &self,
        id: AutomationRuleId,
    ) -> impl Future<Output = Result<(), ChatHubError>> + Send {
        (**self).increment_responses_sent(id)
    }
}

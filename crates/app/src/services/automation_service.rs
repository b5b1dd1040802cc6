//! Automation service: use-cases for managing an organization's
//! automation rules.

use chathub_domain::automation::AutomationRule;
use chathub_domain::error::{ChatHubError, NotFoundError};
use chathub_domain::id::{AutomationRuleId, OrganizationId};

use crate::ports::AutomationRepository;

/// Application service for automation rule CRUD, scoped per organization.
pub struct AutomationService<R> {
    repo: R,
}

impl<R: AutomationRepository> AutomationService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Create a new rule after validating domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ChatHubError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self, rule), fields(organization_id = %rule.organization_id, rule_name = %rule.name))]
    pub async fn create_rule(&self, rule: AutomationRule) -> Result<AutomationRule, ChatHubError> {
        rule.validate()?;
        self.repo.create(rule).await
    }

    /// Look up a rule of the organization, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`ChatHubError::NotFound`] when no rule with `id` exists for
    /// this organization, or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_rule(
        &self,
        organization_id: &OrganizationId,
        id: AutomationRuleId,
    ) -> Result<AutomationRule, ChatHubError> {
        self.repo
            .get_by_id(id)
            .await?
            .filter(|rule| &rule.organization_id == organization_id)
            .ok_or_else(|| {
                NotFoundError {
                    entity: "AutomationRule",
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// List the organization's rules in evaluation order.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_rules(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<AutomationRule>, ChatHubError> {
        let mut rules = self.repo.list_for(organization_id).await?;
        rules.sort_by(AutomationRule::evaluation_order);
        Ok(rules)
    }

    /// Replace an existing rule. `responses_sent` is kept from storage.
    ///
    /// # Errors
    ///
    /// Returns [`ChatHubError::Validation`] if invariants fail,
    /// [`ChatHubError::NotFound`] if the rule does not belong to the
    /// organization, or a storage error from the repository.
    #[tracing::instrument(skip(self, rule), fields(organization_id = %rule.organization_id, rule_id = %rule.id))]
    pub async fn update_rule(
        &self,
        mut rule: AutomationRule,
    ) -> Result<AutomationRule, ChatHubError> {
        rule.validate()?;
        let existing = self.get_rule(&rule.organization_id, rule.id).await?;
        rule.responses_sent = existing.responses_sent;
        self.repo.update(rule).await
    }

    /// Delete a rule of the organization.
    ///
    /// # Errors
    ///
    /// Returns [`ChatHubError::NotFound`] if the rule does not belong to the
    /// organization, or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_rule(
        &self,
        organization_id: &OrganizationId,
        id: AutomationRuleId,
    ) -> Result<(), ChatHubError> {
        self.get_rule(organization_id, id).await?;
        self.repo.delete(id).await
    }
}

//! Automation: keyword-triggered auto-replies.
//!
//! Each [`AutomationRule`] belongs to one organization. When an inbound
//! message matches the rule's [`TriggerType`], the rule's
//! `response_message` is sent back to the sender and `responses_sent` is
//! incremented.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{ChatHubError, ValidationError};
use crate::id::{AutomationRuleId, OrganizationId};

/// What makes a rule fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Body contains any keyword (case-insensitive substring).
    Keyword,
    /// Every inbound body.
    AnyMessage,
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Keyword => "keyword",
            Self::AnyMessage => "any_message",
        })
    }
}

impl std::str::FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keyword" => Ok(Self::Keyword),
            "any_message" => Ok(Self::AnyMessage),
            other => Err(format!("unknown trigger type {other:?}")),
        }
    }
}

/// An auto-reply rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationRule {
    pub id: AutomationRuleId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub trigger_type: TriggerType,
    pub keywords: Vec<String>,
    pub response_message: String,
    /// Lower values are evaluated first.
    pub priority: u32,
    pub is_active: bool,
    pub responses_sent: u64,
}

impl AutomationRule {
    /// Create a builder for constructing an [`AutomationRule`].
    #[must_use]
    pub fn builder() -> AutomationRuleBuilder {
        AutomationRuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ChatHubError::Validation`] when:
    /// - `name` is blank ([`ValidationError::EmptyName`])
    /// - `response_message` is blank ([`ValidationError::EmptyResponse`])
    /// - a keyword rule has no non-blank keyword ([`ValidationError::NoKeywords`])
    pub fn validate(&self) -> Result<(), ChatHubError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.response_message.trim().is_empty() {
            return Err(ValidationError::EmptyResponse.into());
        }
        if self.trigger_type == TriggerType::Keyword
            && self.keywords.iter().all(|k| k.trim().is_empty())
        {
            return Err(ValidationError::NoKeywords.into());
        }
        Ok(())
    }

    /// Whether this rule fires for the given message body.
    #[must_use]
    pub fn matches(&self, body: &str) -> bool {
        if !self.is_active {
            return false;
        }
        match self.trigger_type {
            TriggerType::AnyMessage => true,
            TriggerType::Keyword => {
                let body = body.to_lowercase();
                self.keywords
                    .iter()
                    .map(|k| k.trim())
                    .filter(|k| !k.is_empty())
                    .any(|k| body.contains(&k.to_lowercase()))
            }
        }
    }

    /// Evaluation order: ascending priority, then name.
    #[must_use]
    pub fn evaluation_order(a: &Self, b: &Self) -> Ordering {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.name.cmp(&b.name))
    }
}

/// Pick the first rule, in evaluation order, that matches `body`.
#[must_use]
pub fn first_match<'a>(rules: &'a [AutomationRule], body: &str) -> Option<&'a AutomationRule> {
    let mut ordered: Vec<&AutomationRule> = rules.iter().collect();
    ordered.sort_by(|a, b| AutomationRule::evaluation_order(a, b));
    ordered.into_iter().find(|rule| rule.matches(body))
}

/// Step-by-step builder for [`AutomationRule`].
#[derive(Debug, Default)]
pub struct AutomationRuleBuilder {
    id: Option<AutomationRuleId>,
    organization_id: Option<OrganizationId>,
    name: Option<String>,
    trigger_type: Option<TriggerType>,
    keywords: Vec<String>,
    response_message: Option<String>,
    priority: Option<u32>,
    is_active: Option<bool>,
    responses_sent: Option<u64>,
}

impl AutomationRuleBuilder {
    #[must_use]
    pub fn id(mut self, id: AutomationRuleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn organization_id(mut self, organization_id: OrganizationId) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn trigger_type(mut self, trigger_type: TriggerType) -> Self {
        self.trigger_type = Some(trigger_type);
        self
    }

    #[must_use]
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    #[must_use]
    pub fn keywords(mut self, keywords: impl IntoIterator<Item = String>) -> Self {
        self.keywords.extend(keywords);
        self
    }

    #[must_use]
    pub fn response_message(mut self, response_message: impl Into<String>) -> Self {
        self.response_message = Some(response_message.into());
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub fn is_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    #[must_use]
    pub fn responses_sent(mut self, responses_sent: u64) -> Self {
        self.responses_sent = Some(responses_sent);
        self
    }

    /// Consume the builder, validate, and return an [`AutomationRule`].
    ///
    /// # Errors
    ///
    /// Returns [`ChatHubError::Validation`] if the organization is missing
    /// or any invariant of [`AutomationRule::validate`] fails.
    pub fn build(self) -> Result<AutomationRule, ChatHubError> {
        let organization_id = self
            .organization_id
            .ok_or(ValidationError::EmptyOrganizationId)?;
        let rule = AutomationRule {
            id: self.id.unwrap_or_default(),
            organization_id,
            name: self.name.unwrap_or_default(),
            trigger_type: self.trigger_type.unwrap_or(TriggerType::Keyword),
            keywords: self.keywords,
            response_message: self.response_message.unwrap_or_default(),
            priority: self.priority.unwrap_or(0),
            is_active: self.is_active.unwrap_or(true),
            responses_sent: self.responses_sent.unwrap_or(0),
        };
        rule.validate()?;
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org() -> OrganizationId {
        OrganizationId::new("org-1").unwrap()
    }

    fn price_rule() -> AutomationRule {
        AutomationRule::builder()
            .organization_id(org())
            .name("price")
            .keyword("preço")
            .response_message("Nossos preços estão no site")
            .build()
            .unwrap()
    }

    #[test]
    fn should_build_with_defaults() {
        let rule = price_rule();
        assert_eq!(rule.trigger_type, TriggerType::Keyword);
        assert!(rule.is_active);
        assert_eq!(rule.priority, 0);
        assert_eq!(rule.responses_sent, 0);
    }

    #[test]
    fn should_match_keyword_case_insensitively() {
        let rule = price_rule();
        assert!(rule.matches("qual o preço?"));
        assert!(rule.matches("QUAL O PREÇO?"));
        assert!(!rule.matches("bom dia"));
    }

    #[test]
    fn should_never_match_when_inactive() {
        let mut rule = price_rule();
        rule.is_active = false;
        assert!(!rule.matches("preço"));
    }

    #[test]
    fn should_match_everything_for_any_message_trigger() {
        let rule = AutomationRule::builder()
            .organization_id(org())
            .name("greeting")
            .trigger_type(TriggerType::AnyMessage)
            .response_message("Olá!")
            .build()
            .unwrap();
        assert!(rule.matches("anything"));
    }

    #[test]
    fn should_ignore_blank_keywords() {
        let mut rule = price_rule();
        rule.keywords = vec![String::new(), "  ".to_string(), "preço".to_string()];
        assert!(!rule.matches("hello"));
    }

    #[test]
    fn should_return_validation_error_when_keywords_missing() {
        let err = AutomationRule::builder()
            .organization_id(org())
            .name("empty")
            .keyword("  ")
            .response_message("x")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ChatHubError::Validation(ValidationError::NoKeywords)
        ));
    }

    #[test]
    fn should_return_validation_error_when_name_or_response_empty() {
        let err = AutomationRule::builder()
            .organization_id(org())
            .keyword("k")
            .response_message("x")
            .build()
            .unwrap_err();
        assert!(matches!(err, ChatHubError::Validation(ValidationError::EmptyName)));

        let err = AutomationRule::builder()
            .organization_id(org())
            .name("n")
            .keyword("k")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ChatHubError::Validation(ValidationError::EmptyResponse)
        ));
    }

    #[test]
    fn should_pick_lowest_priority_then_name() {
        let make = |name: &str, priority: u32| {
            AutomationRule::builder()
                .organization_id(org())
                .name(name)
                .keyword("oi")
                .response_message(name)
                .priority(priority)
                .build()
                .unwrap()
        };
        let rules = vec![make("zeta", 1), make("beta", 5), make("alpha", 1)];
        let hit = first_match(&rules, "oi tudo bem").unwrap();
        assert_eq!(hit.name, "alpha");
    }

    #[test]
    fn should_return_none_when_nothing_matches() {
        let rules = vec![price_rule()];
        assert!(first_match(&rules, "bom dia").is_none());
    }

    #[test]
    fn should_parse_trigger_type() {
        assert_eq!("any_message".parse::<TriggerType>(), Ok(TriggerType::AnyMessage));
        assert!("dm_keyword".parse::<TriggerType>().is_err());
    }
}

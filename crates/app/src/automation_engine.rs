//! Automation engine: answers inbound messages that match an
//! organization's keyword rules.
//!
//! For each inbound event the engine loads the organization's active rules,
//! picks the first match in evaluation order, sends the rule's response to
//! the sender, and bumps the rule's `responses_sent` counter once the send
//! succeeded.

use async_trait::async_trait;

use chathub_domain::automation::first_match;
use chathub_domain::error::ChatHubError;
use chathub_domain::id::AutomationRuleId;
use chathub_domain::message::{Direction, InboundMessageEvent, OutboundSendRequest};

use crate::dispatcher::MessageHandler;
use crate::ports::{AutomationRepository, MessageSender};

/// Reactive keyword auto-responder.
pub struct AutomationEngine<AR, MS> {
    automation_repo: AR,
    sender: MS,
}

impl<AR, MS> AutomationEngine<AR, MS>
where
    AR: AutomationRepository + Send + Sync,
    MS: MessageSender + Send + Sync,
{
    /// Create a new engine.
    pub fn new(automation_repo: AR, sender: MS) -> Self {
        Self {
            automation_repo,
            sender,
        }
    }

    /// Evaluate one event. Returns the rule that answered, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error if loading rules or bumping the counter
    /// fails, or the send error when the reply could not be delivered.
    pub async fn process_event(
        &self,
        event: &InboundMessageEvent,
    ) -> Result<Option<AutomationRuleId>, ChatHubError> {
        if event.direction() != Direction::Inbound {
            return Ok(None);
        }

        let rules = self
            .automation_repo
            .list_active_for(event.organization_id())
            .await?;
        let Some(rule) = first_match(&rules, event.body()) else {
            return Ok(None);
        };

        let request = OutboundSendRequest::new(
            event.organization_id().clone(),
            event.from_address(),
            rule.response_message.clone(),
        )?;

        if let Err(err) = self.sender.send(request).await {
            tracing::warn!(
                organization_id = %event.organization_id(),
                rule = %rule.name,
                error = %err,
                "automation reply not delivered"
            );
            return Err(err);
        }

        self.automation_repo
            .increment_responses_sent(rule.id)
            .await?;
        tracing::info!(
            organization_id = %event.organization_id(),
            rule = %rule.name,
            to = event.from_address(),
            "automation reply sent"
        );
        Ok(Some(rule.id))
    }
}

#[async_trait]
impl<AR, MS> MessageHandler for AutomationEngine<AR, MS>
where
    AR: AutomationRepository + Send + Sync,
    MS: MessageSender + Send + Sync,
{
    fn name(&self) -> &'static str {
        "automation"
    }

    async fn handle(&self, event: &InboundMessageEvent) -> Result<(), ChatHubError> {
        self.process_event(event).await.map(|_| ())
    }
}

//! JSON REST handlers for an organization's automation rules.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use chathub_app::ports::{AutomationRepository, ChannelProvider, MessageStore};
use chathub_domain::automation::{AutomationRule, TriggerType};
use chathub_domain::error::{ChatHubError, NotFoundError};
use chathub_domain::id::{AutomationRuleId, OrganizationId};

use crate::api::organization;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for creating or replacing a rule.
///
/// `responsesSent` is not accepted: the counter is owned by the engine.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_trigger")]
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub response_message: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_trigger() -> TriggerType {
    TriggerType::Keyword
}

fn default_active() -> bool {
    true
}

impl RuleRequest {
    fn into_rule(
        self,
        organization_id: OrganizationId,
        id: Option<AutomationRuleId>,
    ) -> Result<AutomationRule, ChatHubError> {
        let mut builder = AutomationRule::builder()
            .organization_id(organization_id)
            .name(self.name)
            .trigger_type(self.trigger_type)
            .keywords(self.keywords)
            .response_message(self.response_message)
            .priority(self.priority)
            .is_active(self.is_active);
        if let Some(id) = id {
            builder = builder.id(id);
        }
        builder.build()
    }
}

/// Parse the `{id}` path segment. Anything that is not a rule id cannot
/// name an existing rule.
fn rule_id(raw: &str) -> Result<AutomationRuleId, ApiError> {
    AutomationRuleId::from_str(raw).map_err(|_| {
        ApiError::from(ChatHubError::from(NotFoundError {
            entity: "AutomationRule",
            id: raw.to_string(),
        }))
    })
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<AutomationRule>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get and update endpoints.
pub enum GetResponse {
    Ok(Json<AutomationRule>),
}

impl IntoResponse for GetResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<AutomationRule>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the delete endpoint.
pub enum DeleteResponse {
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/organizations/:org/automations`: rules in evaluation order.
pub async fn list<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Path(org): Path<String>,
) -> Result<ListResponse, ApiError>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let organization_id = organization(&org)?;
    let rules = state.automation_service.list_rules(&organization_id).await?;
    Ok(ListResponse::Ok(Json(rules)))
}

/// `GET /api/organizations/:org/automations/:id`
pub async fn get<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Path((org, id)): Path<(String, String)>,
) -> Result<GetResponse, ApiError>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let organization_id = organization(&org)?;
    let rule = state
        .automation_service
        .get_rule(&organization_id, rule_id(&id)?)
        .await?;
    Ok(GetResponse::Ok(Json(rule)))
}

/// `POST /api/organizations/:org/automations`: create a rule.
pub async fn create<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Path(org): Path<String>,
    Json(req): Json<RuleRequest>,
) -> Result<CreateResponse, ApiError>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let organization_id = organization(&org)?;
    let rule = req.into_rule(organization_id, None)?;
    let created = state.automation_service.create_rule(rule).await?;
    Ok(CreateResponse::Created(Json(created)))
}

/// `PUT /api/organizations/:org/automations/:id`: replace a rule, keeping
/// its counter.
pub async fn update<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Path((org, id)): Path<(String, String)>,
    Json(req): Json<RuleRequest>,
) -> Result<GetResponse, ApiError>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let organization_id = organization(&org)?;
    let rule = req.into_rule(organization_id, Some(rule_id(&id)?))?;
    let updated = state.automation_service.update_rule(rule).await?;
    Ok(GetResponse::Ok(Json(updated)))
}

/// `DELETE /api/organizations/:org/automations/:id`
pub async fn delete<P, AR, MS>(
    State(state): State<AppState<P, AR, MS>>,
    Path((org, id)): Path<(String, String)>,
) -> Result<DeleteResponse, ApiError>
where
    P: ChannelProvider + Send + Sync + 'static,
    AR: AutomationRepository + Send + Sync + 'static,
    MS: MessageStore + Send + Sync + 'static,
{
    let organization_id = organization(&org)?;
    state
        .automation_service
        .delete_rule(&organization_id, rule_id(&id)?)
        .await?;
    Ok(DeleteResponse::NoContent)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::testing::{TestApp, body_json};

    fn price_rule() -> Value {
        json!({
            "name": "price",
            "keywords": ["preço", "price"],
            "responseMessage": "R$ 10",
            "priority": 1
        })
    }

    #[tokio::test]
    async fn should_create_and_get_rule() {
        let app = TestApp::new(true);

        let created = app
            .post_json("/api/organizations/acme/automations", &price_rule())
            .await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let created: Value = body_json(created).await;
        assert_eq!(created["triggerType"], "keyword");
        assert_eq!(created["isActive"], true);
        assert_eq!(created["responsesSent"], 0);

        let id = created["id"].as_str().unwrap();
        let fetched = app
            .get(&format!("/api/organizations/acme/automations/{id}"))
            .await;
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(body_json(fetched).await["name"], "price");
    }

    #[tokio::test]
    async fn should_reject_keyword_rule_without_keywords() {
        let app = TestApp::new(true);

        let response = app
            .post_json(
                "/api/organizations/acme/automations",
                &json!({ "name": "empty", "responseMessage": "hi" }),
            )
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_hide_rules_of_other_organizations() {
        let app = TestApp::new(true);
        let created: Value = body_json(
            app.post_json("/api/organizations/acme/automations", &price_rule())
                .await,
        )
        .await;
        let id = created["id"].as_str().unwrap();

        let other = app
            .get(&format!("/api/organizations/globex/automations/{id}"))
            .await;
        let listed: Value = body_json(app.get("/api/organizations/globex/automations").await).await;

        assert_eq!(other.status(), StatusCode::NOT_FOUND);
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn should_update_and_delete_rule() {
        let app = TestApp::new(true);
        let created: Value = body_json(
            app.post_json("/api/organizations/acme/automations", &price_rule())
                .await,
        )
        .await;
        let uri = format!(
            "/api/organizations/acme/automations/{}",
            created["id"].as_str().unwrap()
        );

        let updated = app
            .put_json(
                &uri,
                &json!({
                    "name": "price",
                    "keywords": ["valor"],
                    "responseMessage": "R$ 12",
                    "isActive": false
                }),
            )
            .await;
        assert_eq!(updated.status(), StatusCode::OK);
        let updated: Value = body_json(updated).await;
        assert_eq!(updated["keywords"], json!(["valor"]));
        assert_eq!(updated["isActive"], false);

        let deleted = app.delete(&uri).await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
        assert_eq!(app.get(&uri).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn should_answer_not_found_for_malformed_id() {
        let app = TestApp::new(true);
        let response = app
            .get("/api/organizations/acme/automations/not-a-uuid")
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

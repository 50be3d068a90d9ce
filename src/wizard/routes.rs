//! Stateless HTTP surface over the case-creation engine.
//!
//! Clients post the upstream data they already hold and echo back the
//! `latest_state_index` and `state_machine` from the previous response.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::engine::{CaseCreationEngine, GuardContext, Navigation};
use super::model::{Market, Opportunity, VaultProgress};
use super::rules::CaseCreationRules;
use super::state::{CaseCreationInput, StateMachine, WizardStep, compute_case_creation_state};
use crate::error::{Error, ValidationError};

#[derive(Clone)]
pub struct WizardRouteState {
    pub market: Market,
    pub rules: Arc<dyn CaseCreationRules>,
}

fn default_enabled() -> bool {
    true
}

/// Upstream data shared by both endpoints.
#[derive(Debug, Deserialize)]
pub struct CaseContext {
    #[serde(default)]
    pub opportunity_id: Option<String>,
    #[serde(default)]
    pub opportunity: Option<Opportunity>,
    #[serde(default)]
    pub vault_progress: Option<VaultProgress>,
    #[serde(default)]
    pub has_selected_banks: bool,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
    /// Router's last matched route id.
    #[serde(default)]
    pub location: Option<String>,
    /// Echoed from the previous response, together with the state record it
    /// was computed from. Ignored when the record no longer matches.
    #[serde(default)]
    pub latest_state_index: Option<usize>,
    #[serde(default)]
    pub state_machine: Option<StateMachine>,
}

impl CaseContext {
    fn engine(&self, state: &WizardRouteState) -> CaseCreationEngine {
        let machine = compute_case_creation_state(
            CaseCreationInput {
                opportunity: self.opportunity.as_ref(),
                vault_progress: self.vault_progress.as_ref(),
                has_selected_banks: self.has_selected_banks,
                market: state.market,
            },
            state.rules.as_ref(),
        );
        let opportunity_id = self.opportunity_id.clone().filter(|id| !id.is_empty());
        let engine = CaseCreationEngine::new(opportunity_id, machine, self.has_selected_banks);
        match (self.latest_state_index, &self.state_machine) {
            (Some(index), Some(previous)) => engine.resume(previous, index),
            _ => engine,
        }
    }

    fn location(&self) -> &str {
        self.location.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct CaseCreationStateResponse {
    pub state_machine: StateMachine,
    pub steps: Vec<WizardStep>,
    pub latest_state_index: usize,
    pub is_next_state_accessible: bool,
    pub redirect: Option<Navigation>,
}

/// POST /case-creation/state
async fn case_creation_state(
    State(state): State<WizardRouteState>,
    body: Result<Json<CaseContext>, JsonRejection>,
) -> Result<Json<CaseCreationStateResponse>, Error> {
    let Json(ctx) = body.map_err(|r| ValidationError::field("body", r.body_text()))?;
    let engine = ctx.engine(&state);

    let redirect = engine.guard(
        GuardContext {
            is_enabled: ctx.is_enabled,
            opportunity: ctx.opportunity.as_ref(),
            has_vault_progress: ctx.vault_progress.is_some(),
        },
        ctx.location.as_deref(),
    );
    if let Some(nav) = &redirect {
        tracing::info!(
            opportunity_id = ?ctx.opportunity_id,
            location = ?ctx.location,
            to = %nav.to,
            "Case creation guard redirect"
        );
    }

    Ok(Json(CaseCreationStateResponse {
        is_next_state_accessible: engine.is_next_state_accessible(ctx.location()),
        latest_state_index: engine.latest_state_index(),
        steps: engine.routes().to_vec(),
        state_machine: engine.state().clone(),
        redirect,
    }))
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationAction {
    Next,
    Previous,
    Unlock,
    GoTo { index: usize },
}

#[derive(Debug, Deserialize)]
pub struct NavigateBody {
    #[serde(flatten)]
    pub context: CaseContext,
    pub action: NavigationAction,
}

#[derive(Debug, Serialize)]
pub struct NavigateResponse {
    pub navigation: Option<Navigation>,
    pub latest_state_index: usize,
}

/// POST /case-creation/navigate
async fn navigate(
    State(state): State<WizardRouteState>,
    body: Result<Json<NavigateBody>, JsonRejection>,
) -> Result<Json<NavigateResponse>, Error> {
    let Json(body) = body.map_err(|r| ValidationError::field("body", r.body_text()))?;
    let mut engine = body.context.engine(&state);
    let location = body.context.location();

    let navigation = match body.action {
        NavigationAction::Next => engine.go_to_next_state(location),
        NavigationAction::Previous => engine.go_to_previous_state(location),
        NavigationAction::Unlock => engine.unlock_next_step(location),
        NavigationAction::GoTo { index } => engine.go_to_state(index),
    };
    tracing::debug!(action = ?body.action, navigated = navigation.is_some(), "Case creation navigation");

    Ok(Json(NavigateResponse {
        navigation,
        latest_state_index: engine.latest_state_index(),
    }))
}

pub fn wizard_routes(state: WizardRouteState) -> Router {
    Router::new()
        .route("/case-creation/state", post(case_creation_state))
        .route("/case-creation/navigate", post(navigate))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::rules::DefaultRules;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app(market: Market) -> Router {
        wizard_routes(WizardRouteState {
            market,
            rules: Arc::new(DefaultRules),
        })
    }

    async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn opportunity() -> Value {
        json!({
            "client_external_id": "client-7",
            "applicants": [{
                "applicant_type": "main_applicant",
                "first_name": "Layla",
                "last_name": "Haddad",
                "email": "layla@example.com",
                "mobile": "+971500000000",
                "nationality": "AE"
            }],
            "property_value": 2000000.0,
            "loan_amount": 1500000.0,
            "transaction_type": "buy_a_home",
            "emirate": "dubai",
            "bank_applications": [{
                "id": "bank-1",
                "status": "draft",
                "bank_details": { "selected_rate": { "is_default_rate": true } }
            }]
        })
    }

    #[tokio::test]
    async fn state_endpoint_returns_steps_and_latest() {
        let (status, body) = post_json(
            app(Market::Uae),
            "/case-creation/state",
            json!({
                "opportunity_id": "opp-1",
                "opportunity": opportunity(),
                "vault_progress": { "document_progress": { "uploaded": 1, "total": 2 } },
                "has_selected_banks": true,
                "location": "/_layout/case/$opportunityId/basic-info"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["steps"].as_array().unwrap().len(), 6);
        assert_eq!(body["latest_state_index"], json!(3));
        assert_eq!(body["is_next_state_accessible"], json!(true));
        assert!(body["redirect"].is_null());
        assert_eq!(
            body["state_machine"]["/case/$opportunityId/bank-documents"]["state_metadata"]["completed_steps"],
            json!(1)
        );
    }

    #[tokio::test]
    async fn state_endpoint_reports_guard_redirect() {
        let (status, body) = post_json(
            app(Market::Uae),
            "/case-creation/state",
            json!({
                "opportunity_id": "opp-1",
                "location": "/_layout/case/$opportunityId/basic-info"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["redirect"]["to"], json!("/cases"));
        assert_eq!(body["redirect"]["destination"]["kind"], json!("cases"));
    }

    #[tokio::test]
    async fn navigate_unlock_returns_delayed_navigation() {
        let mut request = json!({
            "opportunity_id": "opp-1",
            "opportunity": opportunity(),
            "vault_progress": {},
            "has_selected_banks": true,
            "location": "/_layout/case/$opportunityId/basic-info"
        });
        let (_, state) = post_json(app(Market::Uae), "/case-creation/state", request.clone()).await;

        request["state_machine"] = state["state_machine"].clone();
        request["latest_state_index"] = json!(0);
        request["action"] = json!({ "type": "unlock" });
        let (status, body) = post_json(app(Market::Uae), "/case-creation/navigate", request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["latest_state_index"], json!(1));
        assert_eq!(body["navigation"]["to"], json!("/case/opp-1/bank-documents"));
        assert_eq!(body["navigation"]["delay_ms"], json!(500));
    }

    #[tokio::test]
    async fn stale_index_is_dropped_once_the_state_changes() {
        let mut incomplete = opportunity();
        incomplete["transaction_type"] = Value::Null;
        let mut request = json!({
            "opportunity_id": "opp-1",
            "opportunity": incomplete,
            "vault_progress": {},
            "has_selected_banks": true,
            "location": "/_layout/case/$opportunityId/bank-documents"
        });
        let (_, state) = post_json(app(Market::Uae), "/case-creation/state", request.clone()).await;
        assert_eq!(state["latest_state_index"], json!(1));

        // the broker finishes basic info, then presses next on bank documents
        request["opportunity"] = opportunity();
        request["state_machine"] = state["state_machine"].clone();
        request["latest_state_index"] = json!(1);
        request["action"] = json!({ "type": "next" });
        let (status, body) = post_json(app(Market::Uae), "/case-creation/navigate", request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["latest_state_index"], json!(3));
        assert_eq!(
            body["navigation"]["to"],
            json!("/case/opp-1/submission/fill-forms")
        );
    }

    #[tokio::test]
    async fn navigate_go_to_beyond_latest_is_ignored() {
        let (_, body) = post_json(
            app(Market::Spain),
            "/case-creation/navigate",
            json!({
                "opportunity_id": "opp-1",
                "has_selected_banks": false,
                "action": { "type": "go_to", "index": 3 }
            }),
        )
        .await;
        assert!(body["navigation"].is_null());
        assert_eq!(body["latest_state_index"], json!(0));
    }

    #[tokio::test]
    async fn navigate_rejects_unknown_action() {
        let (status, body) = post_json(
            app(Market::Uae),
            "/case-creation/navigate",
            json!({ "action": { "type": "sideways" } }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error_message"].is_string());
    }
}

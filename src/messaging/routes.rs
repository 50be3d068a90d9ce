//! REST endpoints for messaging: send, OAuth connect, and email preferences.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::response::Redirect;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::model::{AuthorizationState, EmailChannel, OutgoingEmail};
use super::use_cases::{
    AuthorizeExchangeRequest, AuthorizeRequest, AuthorizeResponse, EmailPreferencesRequest,
    EmailPreferencesResponse, MessagingUseCases, SendEmailsRequest, SendEmailsResponse,
    SetEmailProviderPreferenceRequest, SetEmailProviderPreferenceResponse,
};
use crate::error::{Error, ValidationError};

/// Header carrying the shared secret for machine-to-machine calls.
pub const API_KEY_HEADER: &str = "x-messaging-api-key";
/// Headers set by the upstream gateway once the user is authenticated.
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Shared state for messaging routes.
#[derive(Clone)]
pub struct MessagingRouteState {
    pub use_cases: Arc<MessagingUseCases>,
    pub api_key: SecretString,
}

/// Authenticated user, as forwarded by the gateway.
///
/// The username is the account external id.
#[derive(Debug, Clone)]
pub struct RequestUser {
    pub email: String,
    pub account_external_id: Uuid,
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S: Send + Sync> FromRequestParts<S> for RequestUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let email = header(parts, USER_EMAIL_HEADER).ok_or(ValidationError::Unauthenticated)?;
        let username = header(parts, USER_NAME_HEADER).ok_or(ValidationError::Unauthenticated)?;
        let account_external_id =
            Uuid::parse_str(username).map_err(|_| ValidationError::Unauthenticated)?;
        Ok(Self {
            email: email.to_string(),
            account_external_id,
        })
    }
}

/// Guard for endpoints called by other services rather than browsers.
pub struct MessagingApiGuard;

impl FromRequestParts<MessagingRouteState> for MessagingApiGuard {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &MessagingRouteState,
    ) -> Result<Self, Self::Rejection> {
        match header(parts, API_KEY_HEADER) {
            Some(key) if api_key_matches(key, state.api_key.expose_secret()) => Ok(Self),
            _ => Err(ValidationError::InvalidApiKey.into()),
        }
    }
}

/// Constant-time for keys of equal length.
fn api_key_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn bad_json(rejection: JsonRejection) -> Error {
    ValidationError::field("body", rejection.body_text()).into()
}

fn bad_query(rejection: QueryRejection) -> Error {
    ValidationError::field("query", rejection.body_text()).into()
}

// ── Send emails ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SendEmailsBody {
    pub account_external_id: Uuid,
    pub emails: Vec<OutgoingEmail>,
}

/// POST /messaging/send-emails
async fn send_emails(
    _guard: MessagingApiGuard,
    State(state): State<MessagingRouteState>,
    body: Result<Json<SendEmailsBody>, JsonRejection>,
) -> Result<Json<SendEmailsResponse>, Error> {
    let Json(body) = body.map_err(bad_json)?;
    tracing::info!(account_external_id = %body.account_external_id, count = body.emails.len(), "Received a request to send emails");

    let result = state
        .use_cases
        .send_emails
        .handle(SendEmailsRequest {
            account_external_id: body.account_external_id,
            emails: body.emails,
        })
        .await?;
    Ok(Json(result))
}

// ── OAuth ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub callback_url: String,
}

/// GET /messaging/authorize
async fn authorize(
    user: RequestUser,
    State(state): State<MessagingRouteState>,
    query: Result<Query<AuthorizeQuery>, QueryRejection>,
) -> Result<Json<AuthorizeResponse>, Error> {
    let Query(query) = query.map_err(bad_query)?;
    let result = state
        .use_cases
        .authorize
        .handle(AuthorizeRequest {
            callback_url: query.callback_url,
            email: user.email,
            account_external_id: user.account_external_id,
        })
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeExchangeQuery {
    pub state: String,
    pub code: String,
}

/// GET /messaging/authorize/exchange
///
/// Called by the provider's redirect, so there is no gateway identity here;
/// the account comes from the round-tripped `state`, which is not signed.
async fn authorize_exchange(
    State(state): State<MessagingRouteState>,
    query: Result<Query<AuthorizeExchangeQuery>, QueryRejection>,
) -> Result<Redirect, Error> {
    let Query(query) = query.map_err(bad_query)?;
    tracing::info!("Received a request to exchange authorize");

    let oauth_state: AuthorizationState = serde_json::from_str(&query.state)
        .map_err(|e| ValidationError::field("state", format!("not valid JSON: {e}")))?;

    let result = state
        .use_cases
        .authorize_exchange
        .handle(AuthorizeExchangeRequest {
            state: oauth_state,
            code: query.code,
        })
        .await?;
    Ok(Redirect::to(&result.url))
}

// ── Preferences ─────────────────────────────────────────────────────────

/// GET /messaging/email-preferences
async fn email_preferences(
    user: RequestUser,
    State(state): State<MessagingRouteState>,
) -> Result<Json<EmailPreferencesResponse>, Error> {
    let result = state
        .use_cases
        .email_preferences
        .handle(EmailPreferencesRequest {
            account_external_id: user.account_external_id,
        })
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct SetEmailProviderBody {
    pub preferred_channel: EmailChannel,
}

/// PUT /messaging/email-preferences/accounts/{account_external_id}
///
/// Any authenticated user may target any account; the gateway owns
/// account-level authorization.
async fn set_email_provider_preference(
    _user: RequestUser,
    State(state): State<MessagingRouteState>,
    Path(account_external_id): Path<String>,
    body: Result<Json<SetEmailProviderBody>, JsonRejection>,
) -> Result<Json<SetEmailProviderPreferenceResponse>, Error> {
    let account_external_id = Uuid::parse_str(&account_external_id).map_err(|_| {
        ValidationError::field("account_external_id", "Validation failed (uuid is expected)")
    })?;
    let Json(body) = body.map_err(bad_json)?;
    tracing::info!(
        account_external_id = %account_external_id,
        preferred_channel = ?body.preferred_channel,
        "Received a request set email provider preference"
    );

    let result = state
        .use_cases
        .set_email_provider_preference
        .handle(SetEmailProviderPreferenceRequest {
            account_external_id,
            preferred_channel: body.preferred_channel,
        })
        .await?;
    Ok(Json(result))
}

/// Build the messaging REST routes.
pub fn messaging_routes(state: MessagingRouteState) -> Router {
    Router::new()
        .route("/messaging/send-emails", post(send_emails))
        .route("/messaging/authorize", get(authorize))
        .route("/messaging/authorize/exchange", get(authorize_exchange))
        .route("/messaging/email-preferences", get(email_preferences))
        .route(
            "/messaging/email-preferences/accounts/{account_external_id}",
            put(set_email_provider_preference),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::use_cases::testing::{RecordingMailer, StubEmailClient, memory_repo};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn app() -> Router {
        let use_cases = MessagingUseCases::new(
            memory_repo().await,
            Arc::new(StubEmailClient::default()),
            Arc::new(RecordingMailer::default()),
        );
        messaging_routes(MessagingRouteState {
            use_cases: Arc::new(use_cases),
            api_key: SecretString::from("secret".to_string()),
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn send_emails_requires_api_key() {
        let response = app()
            .await
            .oneshot(
                Request::post("/messaging/send-emails")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"account_external_id":"00000000-0000-0000-0000-000000000001","emails":[]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert!(body["error_message"].as_str().unwrap().contains("API key"));
    }

    #[test]
    fn api_key_comparison() {
        assert!(api_key_matches("secret", "secret"));
        assert!(!api_key_matches("secreT", "secret"));
        assert!(!api_key_matches("secret-longer", "secret"));
        assert!(!api_key_matches("", "secret"));
    }

    #[tokio::test]
    async fn send_emails_accepts_matching_api_key() {
        let response = app()
            .await
            .oneshot(
                Request::post("/messaging/send-emails")
                    .header(API_KEY_HEADER, "secret")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"account_external_id":"00000000-0000-0000-0000-000000000001","emails":[{"to":["client@example.com"],"subject":"Hi","body":"Hello"}]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn preferences_require_gateway_identity() {
        let response = app()
            .await
            .oneshot(
                Request::get("/messaging/email-preferences")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn set_preference_rejects_non_uuid_path() {
        let response = app()
            .await
            .oneshot(
                Request::put("/messaging/email-preferences/accounts/not-a-uuid")
                    .header(USER_EMAIL_HEADER, "broker@example.com")
                    .header(USER_NAME_HEADER, "00000000-0000-0000-0000-000000000001")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"preferred_channel":"SELF"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error_message"].as_str().unwrap().contains("uuid"));
    }

    #[tokio::test]
    async fn exchange_rejects_malformed_state() {
        let response = app()
            .await
            .oneshot(
                Request::get("/messaging/authorize/exchange?state=oops&code=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn exchange_redirects_to_callback() {
        let state = serde_json::json!({
            "callback_url": "https://app.example.com/settings",
            "account_external_id": "00000000-0000-0000-0000-000000000002",
            "email": "broker@example.com",
        })
        .to_string();
        let uri = reqwest::Url::parse_with_params(
            "http://localhost/messaging/authorize/exchange",
            &[("state", state.as_str()), ("code", "abc")],
        )
        .unwrap();

        let response = app()
            .await
            .oneshot(
                Request::get(format!("{}?{}", uri.path(), uri.query().unwrap()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()["location"],
            "https://app.example.com/settings?status=connected"
        );
    }
}

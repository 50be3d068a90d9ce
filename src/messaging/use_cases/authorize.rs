//! Build the hosted provider consent link for the signed-in user.

use std::sync::Arc;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, ValidationError};
use crate::messaging::client::EmailClient;
use crate::messaging::model::AuthorizationState;

#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub callback_url: String,
    pub email: String,
    /// Gateway username, which is the account external id.
    pub account_external_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    pub url: String,
}

pub struct AuthorizeUseCase {
    email_client: Arc<dyn EmailClient>,
}

impl AuthorizeUseCase {
    pub fn new(email_client: Arc<dyn EmailClient>) -> Self {
        Self { email_client }
    }

    pub async fn handle(&self, request: AuthorizeRequest) -> Result<AuthorizeResponse, Error> {
        tracing::info!(
            account_external_id = %request.account_external_id,
            callback_url = %request.callback_url,
            "Received a request to authorize email"
        );

        validate_callback_url(&request.callback_url)?;

        let state = AuthorizationState {
            callback_url: request.callback_url,
            account_external_id: request.account_external_id,
            email: request.email.clone(),
        };
        let url = self
            .email_client
            .authorization_url(&state, &request.email)?;
        Ok(AuthorizeResponse { url })
    }
}

/// Callback URLs must be absolute http(s) URLs.
pub(crate) fn validate_callback_url(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw)
        .map_err(|e| ValidationError::field("callback_url", e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ValidationError::field(
            "callback_url",
            format!("unsupported scheme {other}"),
        )),
    }
}

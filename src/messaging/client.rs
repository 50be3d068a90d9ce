//! Hosted email provider client: OAuth grants and send-on-behalf over HTTP.

use async_trait::async_trait;
use reqwest::Url;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::NylasConfig;
use crate::error::EmailClientError;
use crate::messaging::model::{
    AuthorizationState, EmailProvider, GrantDetails, OutgoingEmail, SentEmail,
};

/// Seam to the hosted provider that owns users' mailbox grants.
#[async_trait]
pub trait EmailClient: Send + Sync {
    /// The provider rows created through this client are stored under.
    fn client_name(&self) -> EmailProvider;

    /// Consent URL the user is sent to. `state` comes back on the exchange call.
    fn authorization_url(
        &self,
        state: &AuthorizationState,
        login_hint: &str,
    ) -> Result<String, EmailClientError>;

    /// Trade an authorization code for a mailbox grant.
    async fn exchange_code(&self, code: &str) -> Result<GrantDetails, EmailClientError>;

    /// Send one email from the mailbox behind `grant_id`.
    async fn send_email(
        &self,
        grant_id: &str,
        email: &OutgoingEmail,
    ) -> Result<SentEmail, EmailClientError>;
}

/// Nylas v3 API client.
pub struct NylasClient {
    config: NylasConfig,
    http: reqwest::Client,
}

impl NylasClient {
    pub fn new(config: NylasConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_uri.trim_end_matches('/'), path)
    }

    fn request_failed(reason: impl std::fmt::Display) -> EmailClientError {
        EmailClientError::RequestFailed {
            provider: EmailProvider::Nylas.to_string(),
            reason: reason.to_string(),
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EmailClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailClientError::Rejected {
                provider: EmailProvider::Nylas.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| EmailClientError::InvalidResponse {
                provider: EmailProvider::Nylas.to_string(),
                reason: e.to_string(),
            })
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
    code: &'a str,
    redirect_uri: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    grant_id: String,
    email: String,
    #[serde(default)]
    provider: Option<String>,
}

#[derive(Serialize)]
struct Recipient<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    to: Vec<Recipient<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<Recipient<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc: Vec<Recipient<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reply_to: Vec<Recipient<'a>>,
    subject: &'a str,
    body: &'a str,
}

impl<'a> SendRequest<'a> {
    fn from_email(email: &'a OutgoingEmail) -> Self {
        fn recipients(addrs: &[String]) -> Vec<Recipient<'_>> {
            addrs.iter().map(|a| Recipient { email: a }).collect()
        }
        Self {
            to: recipients(&email.to),
            cc: recipients(&email.cc),
            bcc: recipients(&email.bcc),
            reply_to: email
                .reply_to
                .as_deref()
                .map(|a| vec![Recipient { email: a }])
                .unwrap_or_default(),
            subject: &email.subject,
            body: &email.body,
        }
    }
}

#[derive(Deserialize)]
struct SendResponse {
    data: SentMessage,
}

#[derive(Deserialize)]
struct SentMessage {
    id: String,
}

#[async_trait]
impl EmailClient for NylasClient {
    fn client_name(&self) -> EmailProvider {
        EmailProvider::Nylas
    }

    fn authorization_url(
        &self,
        state: &AuthorizationState,
        login_hint: &str,
    ) -> Result<String, EmailClientError> {
        let state_json = serde_json::to_string(state).map_err(Self::request_failed)?;
        let url = Url::parse_with_params(
            &self.endpoint("/v3/connect/auth"),
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("access_type", "online"),
                ("login_hint", login_hint),
                ("state", state_json.as_str()),
            ],
        )
        .map_err(Self::request_failed)?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<GrantDetails, EmailClientError> {
        tracing::info!("Exchanging authorization code for a grant");
        let response = self
            .http
            .post(self.endpoint("/v3/connect/token"))
            .json(&TokenRequest {
                client_id: &self.config.client_id,
                client_secret: self.config.api_key.expose_secret(),
                grant_type: "authorization_code",
                code,
                redirect_uri: &self.config.redirect_uri,
            })
            .send()
            .await
            .map_err(Self::request_failed)?;

        let token: TokenResponse = Self::read_json(response).await?;
        Ok(GrantDetails {
            grant_id: token.grant_id,
            email: token.email,
            sub_provider: token.provider,
        })
    }

    async fn send_email(
        &self,
        grant_id: &str,
        email: &OutgoingEmail,
    ) -> Result<SentEmail, EmailClientError> {
        let response = self
            .http
            .post(self.endpoint(&format!("/v3/grants/{grant_id}/messages/send")))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&SendRequest::from_email(email))
            .send()
            .await
            .map_err(Self::request_failed)?;

        let sent: SendResponse = Self::read_json(response).await?;
        tracing::info!(grant_id, message_id = %sent.data.id, "Email sent via hosted provider");
        Ok(SentEmail {
            message_id: sent.data.id,
        })
    }
}

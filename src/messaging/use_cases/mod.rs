//! Messaging use-cases, one per endpoint.

pub mod authorize;
pub mod authorize_exchange;
pub mod email_preferences;
pub mod send_emails;
pub mod set_email_provider_preference;

use std::sync::Arc;

pub use authorize::{AuthorizeRequest, AuthorizeResponse, AuthorizeUseCase};
pub use authorize_exchange::{
    AuthorizeExchangeRequest, AuthorizeExchangeResponse, AuthorizeExchangeUseCase,
};
pub use email_preferences::{
    ConnectedProvider, EmailPreferencesRequest, EmailPreferencesResponse, EmailPreferencesUseCase,
};
pub use send_emails::{
    DeliveryStatus, EmailOutcome, SendEmailsRequest, SendEmailsResponse, SendEmailsUseCase,
};
pub use set_email_provider_preference::{
    SetEmailProviderPreferenceRequest, SetEmailProviderPreferenceResponse,
    SetEmailProviderPreferenceUseCase,
};

use crate::messaging::client::EmailClient;
use crate::messaging::mailer::PlatformMailer;
use crate::store::MessagingProviderRepository;

/// All messaging use-cases wired to the same collaborators.
pub struct MessagingUseCases {
    pub send_emails: SendEmailsUseCase,
    pub authorize: AuthorizeUseCase,
    pub authorize_exchange: AuthorizeExchangeUseCase,
    pub email_preferences: EmailPreferencesUseCase,
    pub set_email_provider_preference: SetEmailProviderPreferenceUseCase,
}

impl MessagingUseCases {
    pub fn new(
        repository: Arc<dyn MessagingProviderRepository>,
        email_client: Arc<dyn EmailClient>,
        mailer: Arc<dyn PlatformMailer>,
    ) -> Self {
        Self {
            send_emails: SendEmailsUseCase::new(
                Arc::clone(&repository),
                Arc::clone(&email_client),
                mailer,
            ),
            authorize: AuthorizeUseCase::new(Arc::clone(&email_client)),
            authorize_exchange: AuthorizeExchangeUseCase::new(
                Arc::clone(&repository),
                Arc::clone(&email_client),
            ),
            email_preferences: EmailPreferencesUseCase::new(Arc::clone(&repository)),
            set_email_provider_preference: SetEmailProviderPreferenceUseCase::new(
                repository,
                email_client,
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Stub collaborators shared by the use-case tests.

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::error::EmailClientError;
    use crate::messaging::client::EmailClient;
    use crate::messaging::mailer::PlatformMailer;
    use crate::messaging::model::{
        AuthorizationState, EmailProvider, GrantDetails, OutgoingEmail, SentEmail,
    };
    use crate::store::{LibSqlBackend, MessagingProviderRepository};

    pub async fn memory_repo() -> Arc<dyn MessagingProviderRepository> {
        Arc::new(LibSqlBackend::new_memory().await.unwrap())
    }

    /// Hosted provider stand-in. Records the grant ids it sent through.
    #[derive(Default)]
    pub struct StubEmailClient {
        fail: bool,
        sent: Mutex<Vec<String>>,
    }

    impl StubEmailClient {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmailClient for StubEmailClient {
        fn client_name(&self) -> EmailProvider {
            EmailProvider::Nylas
        }

        fn authorization_url(
            &self,
            state: &AuthorizationState,
            login_hint: &str,
        ) -> Result<String, EmailClientError> {
            let state = serde_json::to_string(state).unwrap();
            let url = reqwest::Url::parse_with_params(
                "https://auth.example.com/connect",
                &[("state", state.as_str()), ("login_hint", login_hint)],
            )
            .unwrap();
            Ok(url.to_string())
        }

        async fn exchange_code(&self, code: &str) -> Result<GrantDetails, EmailClientError> {
            if self.fail {
                return Err(EmailClientError::Rejected {
                    provider: "NYLAS".into(),
                    status: 400,
                    body: "invalid_grant".into(),
                });
            }
            Ok(GrantDetails {
                grant_id: format!("grant-for-{code}"),
                email: "broker@example.com".into(),
                sub_provider: Some("google".into()),
            })
        }

        async fn send_email(
            &self,
            grant_id: &str,
            _email: &OutgoingEmail,
        ) -> Result<SentEmail, EmailClientError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push(grant_id.to_string());
            Ok(SentEmail {
                message_id: format!("hosted-{}", sent.len()),
            })
        }
    }

    /// Platform relay stand-in. Records every email handed to it.
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<OutgoingEmail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PlatformMailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<SentEmail, EmailClientError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push(email.clone());
            Ok(SentEmail {
                message_id: format!("relay-{}", sent.len()),
            })
        }
    }
}

//! Send a batch of emails through the account's preferred provider.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DatabaseError, EmailClientError, Result, ValidationError};
use crate::messaging::client::EmailClient;
use crate::messaging::mailer::PlatformMailer;
use crate::messaging::model::{EmailProvider, MessagingProviderEntity, OutgoingEmail, SentEmail};
use crate::store::MessagingProviderRepository;

#[derive(Debug, Clone)]
pub struct SendEmailsRequest {
    pub account_external_id: Uuid,
    pub emails: Vec<OutgoingEmail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailOutcome {
    pub to: Vec<String>,
    pub status: DeliveryStatus,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEmailsResponse {
    pub provider: EmailProvider,
    pub sent: usize,
    pub failed: usize,
    pub results: Vec<EmailOutcome>,
}

pub struct SendEmailsUseCase {
    repository: Arc<dyn MessagingProviderRepository>,
    email_client: Arc<dyn EmailClient>,
    mailer: Arc<dyn PlatformMailer>,
}

impl SendEmailsUseCase {
    pub fn new(
        repository: Arc<dyn MessagingProviderRepository>,
        email_client: Arc<dyn EmailClient>,
        mailer: Arc<dyn PlatformMailer>,
    ) -> Self {
        Self {
            repository,
            email_client,
            mailer,
        }
    }

    /// The preferred row, or `None` to use the platform relay.
    async fn resolve_provider(
        &self,
        account_external_id: Uuid,
    ) -> Result<Option<MessagingProviderEntity>> {
        match self
            .repository
            .find_preferred_by_account_external_id(account_external_id)
            .await
        {
            Ok(entity) if entity.provider == EmailProvider::SelfHosted => Ok(None),
            Ok(entity) => Ok(Some(entity)),
            Err(DatabaseError::NotFound { .. }) => {
                tracing::info!(
                    account_external_id = %account_external_id,
                    "No preferred provider stored, falling back to SELF"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn deliver(
        &self,
        provider: Option<&MessagingProviderEntity>,
        email: &OutgoingEmail,
    ) -> Result<SentEmail> {
        email.validate()?;
        match provider {
            None => Ok(self.mailer.send(email).await?),
            Some(entity) => {
                let grant_id = entity.grant_id.as_deref().ok_or_else(|| {
                    EmailClientError::RequestFailed {
                        provider: entity.provider.to_string(),
                        reason: "stored provider has no grant".into(),
                    }
                })?;
                Ok(self.email_client.send_email(grant_id, email).await?)
            }
        }
    }

    pub async fn handle(&self, request: SendEmailsRequest) -> Result<SendEmailsResponse> {
        let SendEmailsRequest {
            account_external_id,
            emails,
        } = request;
        tracing::info!(
            account_external_id = %account_external_id,
            count = emails.len(),
            "Received a request to send emails"
        );

        if emails.is_empty() {
            return Err(ValidationError::field("emails", "at least one email is required").into());
        }

        let provider = self.resolve_provider(account_external_id).await?;
        let provider_name = provider
            .as_ref()
            .map(|e| e.provider)
            .unwrap_or(EmailProvider::SelfHosted);

        let mut results = Vec::with_capacity(emails.len());
        for email in &emails {
            let outcome = match self.deliver(provider.as_ref(), email).await {
                Ok(sent) => EmailOutcome {
                    to: email.to.clone(),
                    status: DeliveryStatus::Sent,
                    message_id: Some(sent.message_id),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(error = %e, provider = %provider_name, "Email delivery failed");
                    EmailOutcome {
                        to: email.to.clone(),
                        status: DeliveryStatus::Failed,
                        message_id: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(outcome);
        }

        let sent = results
            .iter()
            .filter(|r| r.status == DeliveryStatus::Sent)
            .count();
        Ok(SendEmailsResponse {
            provider: provider_name,
            sent,
            failed: results.len() - sent,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::messaging::use_cases::testing::{RecordingMailer, StubEmailClient, memory_repo};

    fn email(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: vec![to.into()],
            cc: vec![],
            bcc: vec![],
            reply_to: None,
            subject: "Offer ready".into(),
            body: "<p>Your offer is ready.</p>".into(),
        }
    }

    #[tokio::test]
    async fn falls_back_to_platform_relay_without_rows() {
        let repo = memory_repo().await;
        let mailer = Arc::new(RecordingMailer::default());
        let client = Arc::new(StubEmailClient::default());
        let use_case = SendEmailsUseCase::new(repo, client.clone(), mailer.clone());

        let response = use_case
            .handle(SendEmailsRequest {
                account_external_id: Uuid::new_v4(),
                emails: vec![email("a@example.com"), email("b@example.com")],
            })
            .await
            .unwrap();
        assert_eq!(response.provider, EmailProvider::SelfHosted);
        assert_eq!(response.sent, 2);
        assert_eq!(mailer.sent().len(), 2);
        assert!(client.sent().is_empty());
    }

    #[tokio::test]
    async fn uses_grant_of_preferred_hosted_row() {
        let repo = memory_repo().await;
        let account = Uuid::new_v4();
        let mut hosted =
            MessagingProviderEntity::new(account, EmailProvider::Nylas).with_grant("grant-9");
        hosted.is_preferred = true;
        repo.insert(hosted).await.unwrap();

        let mailer = Arc::new(RecordingMailer::default());
        let client = Arc::new(StubEmailClient::default());
        let use_case = SendEmailsUseCase::new(repo, client.clone(), mailer.clone());

        let response = use_case
            .handle(SendEmailsRequest {
                account_external_id: account,
                emails: vec![email("a@example.com")],
            })
            .await
            .unwrap();
        assert_eq!(response.provider, EmailProvider::Nylas);
        assert_eq!(client.sent(), vec!["grant-9".to_string()]);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn invalid_email_fails_alone() {
        let repo = memory_repo().await;
        let use_case = SendEmailsUseCase::new(
            repo,
            Arc::new(StubEmailClient::default()),
            Arc::new(RecordingMailer::default()),
        );

        let response = use_case
            .handle(SendEmailsRequest {
                account_external_id: Uuid::new_v4(),
                emails: vec![email("a@example.com"), email("nope")],
            })
            .await
            .unwrap();
        assert_eq!(response.sent, 1);
        assert_eq!(response.failed, 1);
        assert_eq!(response.results[1].status, DeliveryStatus::Failed);
        assert!(response.results[1].error.is_some());
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let repo = memory_repo().await;
        let use_case = SendEmailsUseCase::new(
            repo,
            Arc::new(StubEmailClient::default()),
            Arc::new(RecordingMailer::default()),
        );
        let err = use_case
            .handle(SendEmailsRequest {
                account_external_id: Uuid::new_v4(),
                emails: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}

//! Complete the OAuth round trip: store the grant and make it preferred.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::messaging::client::EmailClient;
use crate::messaging::model::{
    AuthorizationState, GrantDetails, MessagingProviderEntity, MessagingProviderPatch,
};
use crate::messaging::use_cases::authorize::validate_callback_url;
use crate::store::MessagingProviderRepository;

#[derive(Debug, Clone)]
pub struct AuthorizeExchangeRequest {
    pub state: AuthorizationState,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeExchangeResponse {
    /// Where the browser is redirected next.
    pub url: String,
}

pub struct AuthorizeExchangeUseCase {
    repository: Arc<dyn MessagingProviderRepository>,
    email_client: Arc<dyn EmailClient>,
}

impl AuthorizeExchangeUseCase {
    pub fn new(
        repository: Arc<dyn MessagingProviderRepository>,
        email_client: Arc<dyn EmailClient>,
    ) -> Self {
        Self {
            repository,
            email_client,
        }
    }

    async fn upsert_grant(
        &self,
        state: &AuthorizationState,
        grant: GrantDetails,
    ) -> Result<MessagingProviderEntity> {
        let provider = self.email_client.client_name();
        let metadata = serde_json::json!({ "email": grant.email });

        let existing = self
            .repository
            .find_by_account_external_id_provider(state.account_external_id, provider)
            .await?;

        let entity = match existing {
            Some(entity) => {
                tracing::info!(id = %entity.id, "Refreshing grant on existing messaging provider");
                self.repository
                    .update(
                        entity,
                        MessagingProviderPatch {
                            grant_id: Some(Some(grant.grant_id)),
                            sub_provider: Some(grant.sub_provider),
                            metadata: Some(metadata),
                            ..Default::default()
                        },
                    )
                    .await?
            }
            None => {
                let entity = MessagingProviderEntity::new(state.account_external_id, provider)
                    .with_grant(grant.grant_id)
                    .with_sub_provider(grant.sub_provider)
                    .with_metadata(metadata);
                entity.validate()?;
                self.repository.insert(entity).await?
            }
        };
        Ok(entity)
    }

    pub async fn handle(
        &self,
        request: AuthorizeExchangeRequest,
    ) -> Result<AuthorizeExchangeResponse> {
        let AuthorizeExchangeRequest { state, code } = request;
        tracing::info!(
            account_external_id = %state.account_external_id,
            "Received a request to exchange authorization"
        );

        let mut redirect = validate_callback_url(&state.callback_url)?;
        let grant = self.email_client.exchange_code(&code).await?;
        let connected = self.upsert_grant(&state, grant).await?;

        let entities = self
            .repository
            .find_all_by_account_external_id(state.account_external_id)
            .await?;
        self.repository
            .update_preferred_email_provider(connected.provider, entities)
            .await?;

        redirect
            .query_pairs_mut()
            .append_pair("status", "connected");
        Ok(AuthorizeExchangeResponse {
            url: redirect.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::messaging::model::EmailProvider;
    use crate::messaging::use_cases::testing::{StubEmailClient, memory_repo};
    use uuid::Uuid;

    fn state(account: Uuid) -> AuthorizationState {
        AuthorizationState {
            callback_url: "https://app.example.com/settings/email".into(),
            account_external_id: account,
            email: "broker@example.com".into(),
        }
    }

    #[tokio::test]
    async fn first_connection_inserts_and_prefers_hosted_row() {
        let repo = memory_repo().await;
        let account = Uuid::new_v4();
        repo.insert(MessagingProviderEntity::default_self(account))
            .await
            .unwrap();

        let use_case =
            AuthorizeExchangeUseCase::new(Arc::clone(&repo), Arc::new(StubEmailClient::default()));
        let response = use_case
            .handle(AuthorizeExchangeRequest {
                state: state(account),
                code: "code-1".into(),
            })
            .await
            .unwrap();
        assert_eq!(
            response.url,
            "https://app.example.com/settings/email?status=connected"
        );

        let preferred = repo
            .find_preferred_by_account_external_id(account)
            .await
            .unwrap();
        assert_eq!(preferred.provider, EmailProvider::Nylas);
        assert_eq!(preferred.grant_id.as_deref(), Some("grant-for-code-1"));
        assert_eq!(preferred.email(), Some("broker@example.com"));

        let rows = repo.find_all_by_account_external_id(account).await.unwrap();
        assert_eq!(rows.iter().filter(|r| r.is_preferred).count(), 1);
    }

    #[tokio::test]
    async fn reconnection_updates_existing_grant() {
        let repo = memory_repo().await;
        let account = Uuid::new_v4();
        let use_case =
            AuthorizeExchangeUseCase::new(Arc::clone(&repo), Arc::new(StubEmailClient::default()));

        for code in ["code-1", "code-2"] {
            use_case
                .handle(AuthorizeExchangeRequest {
                    state: state(account),
                    code: code.into(),
                })
                .await
                .unwrap();
        }

        let rows = repo.find_all_by_account_external_id(account).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].grant_id.as_deref(), Some("grant-for-code-2"));
    }

    #[tokio::test]
    async fn failed_exchange_stores_nothing() {
        let repo = memory_repo().await;
        let account = Uuid::new_v4();
        let use_case = AuthorizeExchangeUseCase::new(
            Arc::clone(&repo),
            Arc::new(StubEmailClient::failing()),
        );

        let err = use_case
            .handle(AuthorizeExchangeRequest {
                state: state(account),
                code: "code-1".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmailClient(_)));
        assert!(
            repo.find_all_by_account_external_id(account)
                .await
                .unwrap()
                .is_empty()
        );
    }
}

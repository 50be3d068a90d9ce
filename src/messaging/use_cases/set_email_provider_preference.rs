//! Switch which provider an account sends email through.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::messaging::client::EmailClient;
use crate::messaging::model::{EmailChannel, EmailProvider, MessagingProviderEntity};
use crate::store::MessagingProviderRepository;

#[derive(Debug, Clone)]
pub struct SetEmailProviderPreferenceRequest {
    pub account_external_id: Uuid,
    pub preferred_channel: EmailChannel,
}

/// `preferred_channel` is the channel now in effect, which can differ from
/// the one requested: an account with no rows always starts on `SELF`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetEmailProviderPreferenceResponse {
    pub account_external_id: Uuid,
    pub preferred_channel: EmailChannel,
}

pub struct SetEmailProviderPreferenceUseCase {
    repository: Arc<dyn MessagingProviderRepository>,
    email_client: Arc<dyn EmailClient>,
}

impl SetEmailProviderPreferenceUseCase {
    pub fn new(
        repository: Arc<dyn MessagingProviderRepository>,
        email_client: Arc<dyn EmailClient>,
    ) -> Self {
        Self {
            repository,
            email_client,
        }
    }

    fn map_preferred_channel_to_provider(&self, channel: EmailChannel) -> EmailProvider {
        match channel {
            EmailChannel::SelfHosted => EmailProvider::SelfHosted,
            EmailChannel::Personal => self.email_client.client_name(),
        }
    }

    async fn create_default_self_entry(&self, account_external_id: Uuid) -> Result<()> {
        tracing::info!(
            account_external_id = %account_external_id,
            "Creating a default messaging provider entry with provider SELF"
        );
        let entity = MessagingProviderEntity::default_self(account_external_id);
        entity.validate()?;
        self.repository.insert(entity).await?;
        Ok(())
    }

    pub async fn handle(
        &self,
        request: SetEmailProviderPreferenceRequest,
    ) -> Result<SetEmailProviderPreferenceResponse> {
        let SetEmailProviderPreferenceRequest {
            account_external_id,
            preferred_channel,
        } = request;
        tracing::info!(
            account_external_id = %account_external_id,
            preferred_channel = ?preferred_channel,
            "Received a request to set email channel preference"
        );

        let mut entities = self
            .repository
            .find_all_by_account_external_id(account_external_id)
            .await?;

        // A fresh account only has the platform relay available.
        if entities.is_empty() {
            self.create_default_self_entry(account_external_id).await?;
            return Ok(SetEmailProviderPreferenceResponse {
                account_external_id,
                preferred_channel: EmailChannel::SelfHosted,
            });
        }

        let provider = self.map_preferred_channel_to_provider(preferred_channel);
        if !entities.iter().any(|e| e.provider == provider) {
            // The platform relay needs no grant, so its row can always be added.
            if provider == EmailProvider::SelfHosted {
                let entity = MessagingProviderEntity::new(account_external_id, provider);
                entity.validate()?;
                entities.push(self.repository.insert(entity).await?);
                self.repository
                    .update_preferred_email_provider(provider, entities)
                    .await?;
                return Ok(SetEmailProviderPreferenceResponse {
                    account_external_id,
                    preferred_channel,
                });
            }
            return Err(DatabaseError::NotFound {
                entity: "MessagingProviderEntity".into(),
                key: format!("provider {provider} for account {account_external_id}"),
            }
            .into());
        }

        self.repository
            .update_preferred_email_provider(provider, entities)
            .await?;

        Ok(SetEmailProviderPreferenceResponse {
            account_external_id,
            preferred_channel,
        })
    }
}

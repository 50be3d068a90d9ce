//! Read an account's email channel preference and connected mailboxes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::messaging::model::{EmailChannel, EmailProvider};
use crate::store::MessagingProviderRepository;

#[derive(Debug, Clone)]
pub struct EmailPreferencesRequest {
    pub account_external_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedProvider {
    pub provider: EmailProvider,
    pub sub_provider: Option<String>,
    pub email: Option<String>,
    pub is_preferred: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailPreferencesResponse {
    pub account_external_id: Uuid,
    pub preferred_channel: EmailChannel,
    pub providers: Vec<ConnectedProvider>,
}

pub struct EmailPreferencesUseCase {
    repository: Arc<dyn MessagingProviderRepository>,
}

impl EmailPreferencesUseCase {
    pub fn new(repository: Arc<dyn MessagingProviderRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(
        &self,
        request: EmailPreferencesRequest,
    ) -> Result<EmailPreferencesResponse> {
        let account_external_id = request.account_external_id;
        tracing::info!(account_external_id = %account_external_id, "Received a request to get email preferences");

        let entities = self
            .repository
            .find_all_by_account_external_id(account_external_id)
            .await?;

        let preferred_channel = entities
            .iter()
            .find(|e| e.is_preferred)
            .map(|e| EmailChannel::from_provider(e.provider))
            .unwrap_or(EmailChannel::SelfHosted);

        let providers = entities
            .iter()
            .map(|e| ConnectedProvider {
                provider: e.provider,
                sub_provider: e.sub_provider.clone(),
                email: e.email().map(String::from),
                is_preferred: e.is_preferred,
            })
            .collect();

        Ok(EmailPreferencesResponse {
            account_external_id,
            preferred_channel,
            providers,
        })
    }
}

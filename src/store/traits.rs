//! `MessagingProviderRepository` trait: async interface for provider persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::messaging::model::{EmailProvider, MessagingProviderEntity, MessagingProviderPatch};

/// Backend-agnostic repository for messaging provider rows.
#[async_trait]
pub trait MessagingProviderRepository: Send + Sync {
    /// Insert a new row. A duplicate `(account, provider)` pair yields
    /// `DatabaseError::UniqueConstraint`.
    async fn insert(
        &self,
        entity: MessagingProviderEntity,
    ) -> Result<MessagingProviderEntity, DatabaseError>;

    /// Look up the row for one account and provider.
    async fn find_by_account_external_id_provider(
        &self,
        account_external_id: Uuid,
        provider: EmailProvider,
    ) -> Result<Option<MessagingProviderEntity>, DatabaseError>;

    /// The account's preferred row, or `DatabaseError::NotFound`.
    async fn find_preferred_by_account_external_id(
        &self,
        account_external_id: Uuid,
    ) -> Result<MessagingProviderEntity, DatabaseError>;

    /// All rows for an account, oldest first.
    async fn find_all_by_account_external_id(
        &self,
        account_external_id: Uuid,
    ) -> Result<Vec<MessagingProviderEntity>, DatabaseError>;

    /// Mark the row for `provider` preferred and every other row not
    /// preferred, persisting the batch atomically.
    async fn update_preferred_email_provider(
        &self,
        provider: EmailProvider,
        entities: Vec<MessagingProviderEntity>,
    ) -> Result<Vec<MessagingProviderEntity>, DatabaseError>;

    /// Apply a partial update to an existing row.
    async fn update(
        &self,
        entity: MessagingProviderEntity,
        patch: MessagingProviderPatch,
    ) -> Result<MessagingProviderEntity, DatabaseError>;
}

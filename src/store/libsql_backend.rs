//! libSQL backend: async `MessagingProviderRepository` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::messaging::model::{EmailProvider, MessagingProviderEntity, MessagingProviderPatch};
use crate::store::migrations;
use crate::store::traits::MessagingProviderRepository;

const ENTITY: &str = "MessagingProviderEntity";

/// SQLite extended result code for a unique index collision.
const UNIQUE_CONSTRAINT_CODE: &str = "SQLITE_CONSTRAINT_UNIQUE";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(backend.conn()).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(backend.conn()).await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_entities(
        &self,
        op: &str,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<MessagingProviderEntity>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        let mut entities = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
        {
            entities.push(row_to_entity(&row)?);
        }
        Ok(entities)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Translate a write failure, surfacing unique index collisions as a domain error.
fn map_write_error(op: &str, e: libsql::Error) -> DatabaseError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed") {
        DatabaseError::UniqueConstraint {
            entity: ENTITY.to_string(),
            code: UNIQUE_CONSTRAINT_CODE.to_string(),
            message,
        }
    } else {
        DatabaseError::Query(format!("{op}: {message}"))
    }
}

const PROVIDER_COLUMNS: &str = "id, account_external_id, provider, sub_provider, grant_id, is_preferred, metadata, created_at, updated_at";

/// Map a libsql Row to a MessagingProviderEntity.
///
/// Column order matches PROVIDER_COLUMNS.
fn row_to_entity(row: &libsql::Row) -> Result<MessagingProviderEntity, DatabaseError> {
    let parse = |e: libsql::Error| DatabaseError::Query(format!("row parse: {e}"));

    let id_str: String = row.get(0).map_err(parse)?;
    let account_str: String = row.get(1).map_err(parse)?;
    let provider_str: String = row.get(2).map_err(parse)?;
    let metadata_str: String = row.get(6).map_err(parse)?;
    let created_str: String = row.get(7).map_err(parse)?;
    let updated_str: String = row.get(8).map_err(parse)?;

    Ok(MessagingProviderEntity {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Serialization(format!("id: {e}")))?,
        account_external_id: Uuid::parse_str(&account_str)
            .map_err(|e| DatabaseError::Serialization(format!("account_external_id: {e}")))?,
        provider: provider_str
            .parse::<EmailProvider>()
            .map_err(DatabaseError::Serialization)?,
        sub_provider: row.get::<String>(3).ok(),
        grant_id: row.get::<String>(4).ok(),
        is_preferred: row.get::<i64>(5).map_err(parse)? != 0,
        metadata: serde_json::from_str(&metadata_str)
            .map_err(|e| DatabaseError::Serialization(format!("metadata: {e}")))?,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl MessagingProviderRepository for LibSqlBackend {
    async fn insert(
        &self,
        entity: MessagingProviderEntity,
    ) -> Result<MessagingProviderEntity, DatabaseError> {
        info!(
            account_external_id = %entity.account_external_id,
            provider = %entity.provider,
            is_preferred = entity.is_preferred,
            "Saving new record of messaging provider"
        );

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO messaging_providers ({PROVIDER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    entity.id.to_string(),
                    entity.account_external_id.to_string(),
                    entity.provider.as_str(),
                    opt_text(entity.sub_provider.as_deref()),
                    opt_text(entity.grant_id.as_deref()),
                    entity.is_preferred as i64,
                    entity.metadata.to_string(),
                    entity.created_at.to_rfc3339(),
                    entity.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| map_write_error("insert", e))?;

        debug!(id = %entity.id, "Messaging provider inserted into DB");
        Ok(entity)
    }

    async fn find_by_account_external_id_provider(
        &self,
        account_external_id: Uuid,
        provider: EmailProvider,
    ) -> Result<Option<MessagingProviderEntity>, DatabaseError> {
        info!(
            account_external_id = %account_external_id,
            provider = %provider,
            "Finding an entry by external account id and provider"
        );
        let mut found = self
            .query_entities(
                "find_by_account_external_id_provider",
                &format!(
                    "SELECT {PROVIDER_COLUMNS} FROM messaging_providers WHERE account_external_id = ?1 AND provider = ?2"
                ),
                params![account_external_id.to_string(), provider.as_str()],
            )
            .await?;
        Ok(found.pop())
    }

    async fn find_preferred_by_account_external_id(
        &self,
        account_external_id: Uuid,
    ) -> Result<MessagingProviderEntity, DatabaseError> {
        info!(account_external_id = %account_external_id, "Finding preferred messaging provider");
        let mut found = self
            .query_entities(
                "find_preferred_by_account_external_id",
                &format!(
                    "SELECT {PROVIDER_COLUMNS} FROM messaging_providers WHERE account_external_id = ?1 AND is_preferred = 1 ORDER BY updated_at DESC LIMIT 1"
                ),
                params![account_external_id.to_string()],
            )
            .await?;
        found.pop().ok_or_else(|| DatabaseError::NotFound {
            entity: ENTITY.to_string(),
            key: format!("preferred provider for account {account_external_id}"),
        })
    }

    async fn find_all_by_account_external_id(
        &self,
        account_external_id: Uuid,
    ) -> Result<Vec<MessagingProviderEntity>, DatabaseError> {
        info!(account_external_id = %account_external_id, "Finding all messaging providers for account");
        self.query_entities(
            "find_all_by_account_external_id",
            &format!(
                "SELECT {PROVIDER_COLUMNS} FROM messaging_providers WHERE account_external_id = ?1 ORDER BY created_at ASC"
            ),
            params![account_external_id.to_string()],
        )
        .await
    }

    async fn update_preferred_email_provider(
        &self,
        provider: EmailProvider,
        mut entities: Vec<MessagingProviderEntity>,
    ) -> Result<Vec<MessagingProviderEntity>, DatabaseError> {
        info!(provider = %provider, count = entities.len(), "Updating preferred email provider");
        let now = Utc::now();
        for entity in entities.iter_mut() {
            entity.is_preferred = entity.provider == provider;
            entity.updated_at = now;
        }

        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("update_preferred_email_provider: {e}")))?;

        for entity in &entities {
            tx.execute(
                "UPDATE messaging_providers SET is_preferred = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    entity.is_preferred as i64,
                    entity.updated_at.to_rfc3339(),
                    entity.id.to_string()
                ],
            )
            .await
            .map_err(|e| map_write_error("update_preferred_email_provider", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("update_preferred_email_provider: {e}")))?;

        Ok(entities)
    }

    async fn update(
        &self,
        mut entity: MessagingProviderEntity,
        patch: MessagingProviderPatch,
    ) -> Result<MessagingProviderEntity, DatabaseError> {
        info!(id = %entity.id, "Updating messaging provider");
        patch.apply(&mut entity);

        let affected = self
            .conn()
            .execute(
                "UPDATE messaging_providers SET sub_provider = ?1, grant_id = ?2, is_preferred = ?3, metadata = ?4, updated_at = ?5 WHERE id = ?6",
                params![
                    opt_text(entity.sub_provider.as_deref()),
                    opt_text(entity.grant_id.as_deref()),
                    entity.is_preferred as i64,
                    entity.metadata.to_string(),
                    entity.updated_at.to_rfc3339(),
                    entity.id.to_string(),
                ],
            )
            .await
            .map_err(|e| map_write_error("update", e))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: ENTITY.to_string(),
                key: format!("id {}", entity.id),
            });
        }
        Ok(entity)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

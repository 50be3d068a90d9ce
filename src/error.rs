//! Error types for casehub.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Email client error: {0}")]
    EmailClient(#[from] EmailClientError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with {key}")]
    NotFound { entity: String, key: String },

    /// A write collided with a unique index.
    #[error("Unique constraint violation on {entity} ({code}): {message}")]
    UniqueConstraint {
        entity: String,
        code: String,
        message: String,
    },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors from the hosted email provider or the platform SMTP relay.
#[derive(Debug, thiserror::Error)]
pub enum EmailClientError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rejected the request with status {status}: {body}")]
    Rejected {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Failed to send email via {transport}: {reason}")]
    SendFailed { transport: String, reason: String },

    #[error("Platform mail relay is not configured")]
    RelayDisabled,
}

/// Request or entity validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Missing authenticated user")]
    Unauthenticated,

    #[error("Invalid API key")]
    InvalidApiKey,
}

impl ValidationError {
    pub fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl Error {
    /// HTTP status reflected to the caller for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Database(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Error::Database(DatabaseError::UniqueConstraint { .. }) => StatusCode::CONFLICT,
            Error::Validation(ValidationError::Unauthenticated)
            | Error::Validation(ValidationError::InvalidApiKey) => StatusCode::UNAUTHORIZED,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::EmailClient(EmailClientError::RelayDisabled) => StatusCode::SERVICE_UNAVAILABLE,
            Error::EmailClient(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) | Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }
        (
            status,
            Json(serde_json::json!({ "error_message": self.to_string() })),
        )
            .into_response()
    }
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;

//! Configuration types, built from environment variables.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::wizard::model::Market;

/// Hosted email provider (OAuth grants) configuration.
#[derive(Debug, Clone)]
pub struct NylasConfig {
    /// Base API URI, e.g. `https://api.us.nylas.com`.
    pub api_uri: String,
    pub client_id: String,
    pub api_key: SecretString,
    /// Where the provider sends the user back after consent.
    pub redirect_uri: String,
}

impl NylasConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_uri: std::env::var("NYLAS_API_URI")
                .unwrap_or_else(|_| "https://api.us.nylas.com".to_string()),
            client_id: required("NYLAS_CLIENT_ID")?,
            api_key: SecretString::from(required("NYLAS_API_KEY")?),
            redirect_uri: required("NYLAS_REDIRECT_URI")?,
        })
    }
}

/// Platform SMTP relay configuration, used for the `SELF` provider.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl SmtpConfig {
    /// Returns `None` if `SMTP_HOST` is not set (platform mail disabled).
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(host) = std::env::var("SMTP_HOST") else {
            return Ok(None);
        };

        let port = parse_or("SMTP_PORT", 587)?;
        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password = SecretString::from(std::env::var("SMTP_PASSWORD").unwrap_or_default());
        let from_address =
            std::env::var("SMTP_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Ok(Some(Self {
            host,
            port,
            username,
            password,
            from_address,
        }))
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub db_path: PathBuf,
    /// Shared secret checked on machine-to-machine endpoints.
    pub messaging_api_key: SecretString,
    pub market: Market,
    pub nylas: NylasConfig,
    pub smtp: Option<SmtpConfig>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let market = match std::env::var("CASEHUB_MARKET") {
            Ok(value) => value.parse().map_err(|message| ConfigError::InvalidValue {
                key: "CASEHUB_MARKET".into(),
                message,
            })?,
            Err(_) => Market::default(),
        };

        Ok(Self {
            port: parse_or("CASEHUB_PORT", 8080)?,
            db_path: std::env::var("CASEHUB_DB_PATH")
                .unwrap_or_else(|_| "./data/casehub.db".to_string())
                .into(),
            messaging_api_key: SecretString::from(required("MESSAGING_API_KEY")?),
            market,
            nylas: NylasConfig::from_env()?,
            smtp: SmtpConfig::from_env()?,
        })
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests use keys no other test touches.

    #[test]
    fn parse_or_falls_back_to_default() {
        assert_eq!(parse_or("CASEHUB_TEST_UNSET_PORT", 9000u16).unwrap(), 9000);
    }

    #[test]
    fn parse_or_rejects_garbage() {
        unsafe { std::env::set_var("CASEHUB_TEST_BAD_PORT", "eighty") };
        let err = parse_or("CASEHUB_TEST_BAD_PORT", 80u16).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CASEHUB_TEST_BAD_PORT"));
    }

    #[test]
    fn required_rejects_blank_values() {
        unsafe { std::env::set_var("CASEHUB_TEST_BLANK", "  ") };
        let err = required("CASEHUB_TEST_BLANK").unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }
}

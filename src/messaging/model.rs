//! Messaging provider domain types.

use chrono::{DateTime, Utc};
use lettre::Address;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Backend that actually delivers an account's email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmailProvider {
    /// Platform SMTP relay.
    #[serde(rename = "SELF")]
    SelfHosted,
    /// Hosted OAuth provider connected to the user's own mailbox.
    #[serde(rename = "NYLAS")]
    Nylas,
}

impl EmailProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfHosted => "SELF",
            Self::Nylas => "NYLAS",
        }
    }
}

impl std::fmt::Display for EmailProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmailProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SELF" => Ok(Self::SelfHosted),
            "NYLAS" => Ok(Self::Nylas),
            other => Err(format!("unknown email provider: {other}")),
        }
    }
}

/// The channel a user picks in the preferences UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmailChannel {
    /// Send from the platform address.
    #[serde(rename = "SELF")]
    SelfHosted,
    /// Send from the user's connected mailbox.
    #[serde(rename = "PERSONAL")]
    Personal,
}

impl EmailChannel {
    /// The channel a stored provider row corresponds to.
    pub fn from_provider(provider: EmailProvider) -> Self {
        match provider {
            EmailProvider::SelfHosted => Self::SelfHosted,
            EmailProvider::Nylas => Self::Personal,
        }
    }
}

/// Persisted messaging provider row.
///
/// At most one row per account is preferred; `update_preferred_email_provider`
/// keeps that true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagingProviderEntity {
    pub id: Uuid,
    pub account_external_id: Uuid,
    pub provider: EmailProvider,
    pub sub_provider: Option<String>,
    pub grant_id: Option<String>,
    pub is_preferred: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessagingProviderEntity {
    pub fn new(account_external_id: Uuid, provider: EmailProvider) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_external_id,
            provider,
            sub_provider: None,
            grant_id: None,
            is_preferred: false,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    /// The default row created for accounts with no provider yet.
    pub fn default_self(account_external_id: Uuid) -> Self {
        Self {
            is_preferred: true,
            ..Self::new(account_external_id, EmailProvider::SelfHosted)
        }
    }

    pub fn with_grant(mut self, grant_id: impl Into<String>) -> Self {
        self.grant_id = Some(grant_id.into());
        self
    }

    pub fn with_sub_provider(mut self, sub_provider: Option<String>) -> Self {
        self.sub_provider = sub_provider;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Check row-level invariants before it is written.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.metadata.is_object() {
            return Err(ValidationError::field("metadata", "must be a JSON object"));
        }
        match self.provider {
            EmailProvider::SelfHosted if self.grant_id.is_some() => Err(ValidationError::field(
                "grant_id",
                "SELF provider cannot carry a grant",
            )),
            EmailProvider::Nylas
                if self.grant_id.as_deref().is_none_or(|g| g.trim().is_empty()) =>
            {
                Err(ValidationError::field(
                    "grant_id",
                    "hosted provider requires a grant",
                ))
            }
            _ => Ok(()),
        }
    }

    /// Mailbox address recorded at connection time, if any.
    pub fn email(&self) -> Option<&str> {
        self.metadata.get("email").and_then(|v| v.as_str())
    }
}

/// Partial update applied by `MessagingProviderRepository::update`.
#[derive(Debug, Clone, Default)]
pub struct MessagingProviderPatch {
    pub sub_provider: Option<Option<String>>,
    pub grant_id: Option<Option<String>>,
    pub is_preferred: Option<bool>,
    pub metadata: Option<serde_json::Value>,
}

impl MessagingProviderPatch {
    /// Assign the set fields onto `entity`.
    pub fn apply(self, entity: &mut MessagingProviderEntity) {
        if let Some(sub_provider) = self.sub_provider {
            entity.sub_provider = sub_provider;
        }
        if let Some(grant_id) = self.grant_id {
            entity.grant_id = grant_id;
        }
        if let Some(is_preferred) = self.is_preferred {
            entity.is_preferred = is_preferred;
        }
        if let Some(metadata) = self.metadata {
            entity.metadata = metadata;
        }
        entity.updated_at = Utc::now();
    }
}

/// A single outbound email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.to.is_empty() {
            return Err(ValidationError::field("to", "at least one recipient is required"));
        }
        for (field, addrs) in [("to", &self.to), ("cc", &self.cc), ("bcc", &self.bcc)] {
            if let Some(bad) = addrs.iter().find(|addr| !is_valid_address(addr)) {
                return Err(ValidationError::field(field, format!("invalid address: {bad}")));
            }
        }
        if let Some(reply_to) = self.reply_to.as_deref().filter(|a| !is_valid_address(a)) {
            return Err(ValidationError::field(
                "reply_to",
                format!("invalid address: {reply_to}"),
            ));
        }
        if self.subject.trim().is_empty() {
            return Err(ValidationError::field("subject", "must not be empty"));
        }
        Ok(())
    }
}

fn is_valid_address(addr: &str) -> bool {
    addr.trim().parse::<Address>().is_ok()
}

/// Provider-side identifier of a delivered email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentEmail {
    pub message_id: String,
}

/// OAuth `state` round-tripped through the hosted provider.
///
/// Plain unsigned JSON. Whoever calls the exchange endpoint picks the
/// `account_external_id` the grant is bound to; signing it would close that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationState {
    pub callback_url: String,
    pub account_external_id: Uuid,
    pub email: String,
}

/// Grant returned by the hosted provider after a code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantDetails {
    pub grant_id: String,
    pub email: String,
    /// Upstream mailbox vendor, e.g. `google`.
    pub sub_provider: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_round_trips_through_str() {
        for provider in [EmailProvider::SelfHosted, EmailProvider::Nylas] {
            assert_eq!(provider.as_str().parse::<EmailProvider>().unwrap(), provider);
        }
        assert!("SMTP".parse::<EmailProvider>().is_err());
    }

    #[test]
    fn channel_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&EmailChannel::SelfHosted).unwrap(),
            "\"SELF\""
        );
        let parsed: EmailChannel = serde_json::from_str("\"PERSONAL\"").unwrap();
        assert_eq!(parsed, EmailChannel::Personal);
    }

    #[test]
    fn default_self_row_is_preferred_and_valid() {
        let entity = MessagingProviderEntity::default_self(Uuid::new_v4());
        assert!(entity.is_preferred);
        assert_eq!(entity.provider, EmailProvider::SelfHosted);
        entity.validate().unwrap();
    }

    #[test]
    fn hosted_row_requires_grant() {
        let entity = MessagingProviderEntity::new(Uuid::new_v4(), EmailProvider::Nylas);
        assert!(entity.validate().is_err());
        entity.with_grant("grant-1").validate().unwrap();
    }

    #[test]
    fn self_row_rejects_grant_and_non_object_metadata() {
        let with_grant =
            MessagingProviderEntity::new(Uuid::new_v4(), EmailProvider::SelfHosted).with_grant("g");
        assert!(with_grant.validate().is_err());

        let bad_meta = MessagingProviderEntity::new(Uuid::new_v4(), EmailProvider::SelfHosted)
            .with_metadata(serde_json::json!([1, 2]));
        assert!(bad_meta.validate().is_err());
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let mut entity = MessagingProviderEntity::new(Uuid::new_v4(), EmailProvider::Nylas)
            .with_grant("old")
            .with_sub_provider(Some("google".into()));
        MessagingProviderPatch {
            grant_id: Some(Some("new".into())),
            ..Default::default()
        }
        .apply(&mut entity);
        assert_eq!(entity.grant_id.as_deref(), Some("new"));
        assert_eq!(entity.sub_provider.as_deref(), Some("google"));
        assert!(!entity.is_preferred);
    }

    #[test]
    fn outgoing_email_validation() {
        let mut email = OutgoingEmail {
            to: vec!["client@example.com".into()],
            cc: vec![],
            bcc: vec![],
            reply_to: None,
            subject: "Your mortgage".into(),
            body: "Hello".into(),
        };
        email.validate().unwrap();

        email.cc.push("not-an-address".into());
        assert!(email.validate().is_err());

        email.cc.clear();
        email.to.clear();
        assert!(email.validate().is_err());
    }

    #[test]
    fn outgoing_email_addresses_follow_smtp_rules() {
        let email = |to: &str| OutgoingEmail {
            to: vec![to.into()],
            cc: vec![],
            bcc: vec![],
            reply_to: None,
            subject: "Your mortgage".into(),
            body: "Hello".into(),
        };
        assert!(email("a@..").validate().is_err());
        assert!(email("a@b.").validate().is_err());
        email("user@localhost").validate().unwrap();

        let mut with_reply = email("client@example.com");
        with_reply.reply_to = Some("broker at example".into());
        let err = with_reply.validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { ref field, .. } if field == "reply_to"));
        with_reply.reply_to = Some("broker@example.com".into());
        with_reply.validate().unwrap();
    }
}

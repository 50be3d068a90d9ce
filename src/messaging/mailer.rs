//! Platform SMTP relay: outbound mail for accounts on the `SELF` provider.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::config::SmtpConfig;
use crate::error::EmailClientError;
use crate::messaging::model::{OutgoingEmail, SentEmail};

/// Seam to the platform's own outbound mail path.
#[async_trait]
pub trait PlatformMailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<SentEmail, EmailClientError>;
}

/// SMTP relay via lettre.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

fn send_failed(reason: impl std::fmt::Display) -> EmailClientError {
    EmailClientError::SendFailed {
        transport: "smtp".into(),
        reason: reason.to_string(),
    }
}

fn mailbox(addr: &str) -> Result<Mailbox, EmailClientError> {
    addr.parse()
        .map_err(|e| send_failed(format!("Invalid address {addr}: {e}")))
}

/// Build the RFC 5322 message with a generated Message-ID.
fn build_message(
    from_address: &str,
    email: &OutgoingEmail,
) -> Result<(Message, String), EmailClientError> {
    let domain = from_address.rsplit('@').next().unwrap_or("localhost");
    let message_id = format!("<{}@{}>", Uuid::new_v4(), domain);

    let mut builder = Message::builder()
        .from(mailbox(from_address)?)
        .subject(email.subject.as_str())
        .message_id(Some(message_id.clone()));
    for to in &email.to {
        builder = builder.to(mailbox(to)?);
    }
    for cc in &email.cc {
        builder = builder.cc(mailbox(cc)?);
    }
    for bcc in &email.bcc {
        builder = builder.bcc(mailbox(bcc)?);
    }
    if let Some(reply_to) = &email.reply_to {
        builder = builder.reply_to(mailbox(reply_to)?);
    }

    let message = builder
        .header(ContentType::TEXT_HTML)
        .body(email.body.clone())
        .map_err(|e| send_failed(format!("Failed to build email: {e}")))?;
    Ok((message, message_id))
}

#[async_trait]
impl PlatformMailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<SentEmail, EmailClientError> {
        let (message, message_id) = build_message(&self.config.from_address, email)?;
        let config = self.config.clone();

        // lettre's sync transport blocks; keep it off the runtime threads.
        tokio::task::spawn_blocking(move || {
            let creds = Credentials::new(
                config.username.clone(),
                config.password.expose_secret().to_string(),
            );
            let transport = SmtpTransport::relay(&config.host)
                .map_err(|e| send_failed(format!("SMTP relay error: {e}")))?
                .port(config.port)
                .credentials(creds)
                .build();
            transport
                .send(&message)
                .map_err(|e| send_failed(format!("SMTP send failed: {e}")))
        })
        .await
        .map_err(|e| send_failed(format!("SMTP task panicked: {e}")))??;

        tracing::info!(message_id = %message_id, recipients = email.to.len(), "Email sent via platform relay");
        Ok(SentEmail { message_id })
    }
}

/// Stand-in used when no SMTP host is configured.
pub struct DisabledMailer;

#[async_trait]
impl PlatformMailer for DisabledMailer {
    async fn send(&self, _email: &OutgoingEmail) -> Result<SentEmail, EmailClientError> {
        Err(EmailClientError::RelayDisabled)
    }
}

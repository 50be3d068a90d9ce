//! Messaging provider preferences: which mailbox an account sends from,
//! how a personal mailbox gets connected, and sending through it.

pub mod client;
pub mod mailer;
pub mod model;
pub mod routes;
pub mod use_cases;

pub use client::{EmailClient, NylasClient};
pub use mailer::{DisabledMailer, PlatformMailer, SmtpMailer};
pub use model::{EmailChannel, EmailProvider, MessagingProviderEntity, OutgoingEmail};
pub use routes::{MessagingRouteState, messaging_routes};
pub use use_cases::MessagingUseCases;

use std::sync::Arc;

use casehub::app::build_router;
use casehub::config::ServiceConfig;
use casehub::messaging::{
    DisabledMailer, MessagingRouteState, MessagingUseCases, NylasClient, PlatformMailer,
    SmtpMailer,
};
use casehub::store::{LibSqlBackend, MessagingProviderRepository};
use casehub::wizard::{DefaultRules, WizardRouteState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env()?;

    eprintln!("CaseHub v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Market: {:?}", config.market);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   HTTP: http://0.0.0.0:{}", config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let repository: Arc<dyn MessagingProviderRepository> =
        Arc::new(LibSqlBackend::new_local(&config.db_path).await?);

    // ── Email transports ─────────────────────────────────────────────────
    let email_client = Arc::new(NylasClient::new(config.nylas.clone()));
    let mailer: Arc<dyn PlatformMailer> = match config.smtp.clone() {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "Platform SMTP relay configured");
            Arc::new(SmtpMailer::new(smtp))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, platform mail is disabled");
            Arc::new(DisabledMailer)
        }
    };

    let use_cases = MessagingUseCases::new(repository, email_client, mailer);

    let app = build_router(
        MessagingRouteState {
            use_cases: Arc::new(use_cases),
            api_key: config.messaging_api_key.clone(),
        },
        WizardRouteState {
            market: config.market,
            rules: Arc::new(DefaultRules),
        },
    );

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "CaseHub server started");
    axum::serve(listener, app).await?;

    Ok(())
}

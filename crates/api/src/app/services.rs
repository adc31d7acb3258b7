//! Collaborator wiring: stores, notifier and token signer behind one handle.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

use campusid_accounts::{AccountService, EmailPolicy, MailError, Notifier, ServiceSettings};
use campusid_auth::{KeyError, TokenSigner};
use campusid_core::{Clock, DomainError, SystemClock};
use campusid_infra::{HttpMailRelay, LogNotifier, PostgresLinkStore, PostgresUserStore, connect, ensure_schema};

use crate::config::AppConfig;

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub accounts: AccountService,
    pub signer: Arc<TokenSigner>,
    pub session_ttl: chrono::Duration,
}

impl AppServices {
    pub fn new(accounts: AccountService, signer: Arc<TokenSigner>, session_ttl: chrono::Duration) -> Self {
        Self {
            accounts,
            signer,
            session_ttl,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("signing keys: {0}")]
    Keys(#[from] KeyError),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("mail relay: {0}")]
    Mail(#[from] MailError),

    #[error("configuration: {0}")]
    Config(#[from] DomainError),
}

/// Wire Postgres stores, the configured notifier and the signer.
///
/// Returns the pool as well so the caller can close it on shutdown.
pub async fn build_services(config: &AppConfig) -> Result<(AppServices, PgPool), StartupError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let signer = Arc::new(TokenSigner::from_pem_files(
        &config.private_key_path,
        &config.public_key_path,
        config.signer.clone(),
        clock.clone(),
    )?);

    let pool = connect(&config.database).await?;
    ensure_schema(&pool).await?;

    let notifier: Arc<dyn Notifier> = match &config.mail.relay_url {
        Some(url) => {
            info!(relay = %url, "mail relay configured");
            Arc::new(HttpMailRelay::new(url.clone(), config.mail.timeout)?)
        }
        None => {
            warn!("no mail relay configured; outgoing mail will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let settings = ServiceSettings::new(
        EmailPolicy::new(&config.institutional_domain)?,
        config.link_base_url.clone(),
        config.mail.sender.clone(),
    );

    let accounts = AccountService::new(
        Arc::new(PostgresUserStore::new(pool.clone())),
        Arc::new(PostgresLinkStore::new(pool.clone())),
        notifier,
        clock,
        settings,
    );

    Ok((AppServices::new(accounts, signer, config.session_ttl), pool))
}

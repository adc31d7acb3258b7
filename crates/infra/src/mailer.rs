//! Outbound mail: an HTTP relay client and a log-only notifier for development.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument};

use campusid_accounts::{MailError, MailMessage, Notifier};

/// Posts each message as JSON to a mail relay endpoint.
#[derive(Debug, Clone)]
pub struct HttpMailRelay {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

impl HttpMailRelay {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait::async_trait]
impl Notifier for HttpMailRelay {
    #[instrument(skip_all, fields(subject = %message.subject), err)]
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RelayRequest {
                from: &message.from,
                to: &message.to,
                subject: &message.subject,
                html: &message.html_body,
            })
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected(format!("{status}: {body}")));
        }

        debug!(recipients = message.to.len(), "mail handed to relay");
        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
///
/// Bodies carry live link codes, so they only appear at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        info!(
            to = ?message.to,
            subject = %message.subject,
            "mail delivery disabled; message dropped"
        );
        debug!(body = %message.html_body, "dropped mail body");
        Ok(())
    }
}

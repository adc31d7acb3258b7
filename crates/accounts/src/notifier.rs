//! Outbound mail contract.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("mail relay rejected message: {0}")]
    Rejected(String),

    #[error("mail transport failure: {0}")]
    Transport(String),
}

/// Best-effort mail delivery. Callers never roll back on failure.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

/// Keeps every message in memory; can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<MailMessage>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.set_failing(true);
        notifier
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successfully delivered messages, oldest first.
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Transport("recording notifier set to fail".to_string()));
        }
        self.sent
            .lock()
            .map_err(|_| MailError::Transport("recording notifier lock poisoned".to_string()))?
            .push(message);
        Ok(())
    }
}

use thiserror::Error;
use tracing::error;

use campusid_auth::PasswordError;
use campusid_core::DomainError;

use crate::store::StoreError;

pub type AccountResult<T> = Result<T, AccountError>;

/// Lifecycle failure, grouped by how a caller must react.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("email is not an institutional address")]
    NonInstitutionalEmail,

    #[error("password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("{0}")]
    Validation(String),

    #[error("account not found")]
    UserNotFound,

    #[error("verification link not found")]
    LinkNotFound,

    /// The link exists but was already used or has run out of time.
    #[error("verification link is expired or already used")]
    LinkExpired,

    #[error("verification link cannot be used for this action")]
    LinkIntentMismatch,

    #[error("email is already registered")]
    AlreadyRegistered,

    #[error("account is already active")]
    AlreadyActive,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account is not active")]
    AccountInactive,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Credential(#[from] PasswordError),
}

impl From<DomainError> for AccountError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => AccountError::Validation(msg),
        }
    }
}

/// Log a store failure with the failing operation and pass it on unchanged.
pub(crate) fn store_fault(operation: &'static str) -> impl FnOnce(StoreError) -> AccountError {
    move |err| {
        error!(operation, error = %err, "store call failed");
        AccountError::Store(err)
    }
}

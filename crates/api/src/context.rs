use chrono::{DateTime, Utc};

use campusid_accounts::User;

/// The authenticated caller of a request.
///
/// Inserted by the bearer middleware after the session token checks out and
/// the account is still active.
#[derive(Debug, Clone)]
pub struct SessionContext {
    user: User,
    token_id: String,
    expires_at: Option<DateTime<Utc>>,
}

impl SessionContext {
    pub fn new(user: User, token_id: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            user,
            token_id,
            expires_at,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

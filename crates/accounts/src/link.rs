//! Single-use, time-bounded verification links.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use campusid_core::{DomainError, LinkId, UserId};

/// Opaque link code: 32 lowercase hex characters from a random UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkCode(String);

impl LinkCode {
    pub const LEN: usize = 32;

    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for LinkCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let well_formed = s.len() == Self::LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(DomainError::invalid_id("malformed link code"));
        }
        Ok(Self(s.to_string()))
    }
}

impl core::fmt::Display for LinkCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The lifecycle transition a link authorizes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkIntent {
    Confirmation,
    Reactivation,
    PasswordReset,
}

impl LinkIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkIntent::Confirmation => "confirmation",
            LinkIntent::Reactivation => "reactivation",
            LinkIntent::PasswordReset => "password_reset",
        }
    }
}

impl core::fmt::Display for LinkIntent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkIntent {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmation" => Ok(LinkIntent::Confirmation),
            "reactivation" => Ok(LinkIntent::Reactivation),
            "password_reset" => Ok(LinkIntent::PasswordReset),
            other => Err(DomainError::validation(format!("unknown link intent: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationLink {
    pub id: LinkId,
    pub code: LinkCode,
    pub user_id: UserId,
    pub intent: LinkIntent,
    pub expires_at: DateTime<Utc>,
    pub utilised: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationLink {
    pub fn is_consumable(&self, now: DateTime<Utc>) -> bool {
        !self.utilised && now < self.expires_at
    }
}

/// A link ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub id: LinkId,
    pub code: LinkCode,
    pub user_id: UserId,
    pub intent: LinkIntent,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewLink {
    pub fn into_link(self) -> VerificationLink {
        VerificationLink {
            id: self.id,
            code: self.code,
            user_id: self.user_id,
            intent: self.intent,
            expires_at: self.expires_at,
            utilised: false,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

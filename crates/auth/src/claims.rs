use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session token claims model.
///
/// Timestamps are unix seconds, as the JWT registered claims require.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Application payload (for session tokens: the account id).
    pub payload: String,

    /// Issuing authority.
    pub iss: String,

    /// Intended audience.
    pub aud: String,

    /// Unique token id.
    pub jti: String,

    /// Issued-at timestamp.
    pub iat: i64,

    /// Expiration timestamp.
    pub exp: i64,
}

impl TokenClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimWindowError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time window of decoded claims.
///
/// Signature verification happens before this, in the signer.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), ClaimWindowError> {
    if claims.exp <= claims.iat {
        return Err(ClaimWindowError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(ClaimWindowError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(ClaimWindowError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(iat: i64, exp: i64) -> TokenClaims {
        TokenClaims {
            payload: "p".into(),
            iss: "i".into(),
            aud: "a".into(),
            jti: "j".into(),
            iat,
            exp,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn inside_window_is_valid() {
        assert_eq!(validate_claims(&claims(100, 200), at(150)), Ok(()));
        assert_eq!(validate_claims(&claims(100, 200), at(100)), Ok(()));
    }

    #[test]
    fn at_or_after_exp_is_expired() {
        assert_eq!(
            validate_claims(&claims(100, 200), at(200)),
            Err(ClaimWindowError::Expired)
        );
    }

    #[test]
    fn before_iat_is_not_yet_valid() {
        assert_eq!(
            validate_claims(&claims(100, 200), at(99)),
            Err(ClaimWindowError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        assert_eq!(
            validate_claims(&claims(200, 200), at(200)),
            Err(ClaimWindowError::InvalidTimeWindow)
        );
    }
}

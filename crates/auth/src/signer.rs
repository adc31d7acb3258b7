//! EdDSA session token issuance and validation.
//!
//! The key pair is loaded once at startup and held for the process lifetime.
//! Validation checks the signature over the raw `header.payload` bytes before
//! anything inside the token is parsed, so a modified token is always
//! reported as a signature fault.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use tracing::{error, instrument};
use uuid::Uuid;

use campusid_core::Clock;

use crate::claims::{ClaimWindowError, TokenClaims, validate_claims};

const ALGORITHM: Algorithm = Algorithm::EdDSA;

/// Fixed issuer/audience stamped into every token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerSettings {
    pub issuer: String,
    pub audience: String,
}

impl Default for SignerSettings {
    fn default() -> Self {
        Self {
            issuer: "https://auca.kg/auth/configuration".to_string(),
            audience: "campusid".to_string(),
        }
    }
}

/// Key material could not be loaded. Fatal at startup.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to read key file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse EdDSA {which} key: {source}")]
    Parse {
        which: &'static str,
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    #[error("private and public keys do not form a pair")]
    Mismatch,
}

/// Token could not be produced. This is a service fault, never a client error.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("token ttl must be positive and within the representable time range")]
    InvalidTtl,

    #[error("failed to sign token: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),
}

/// Why a presented token was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    Signature,

    #[error("unexpected signing algorithm: {0}")]
    Algorithm(String),

    #[error("malformed token claims: {0}")]
    Claims(String),

    #[error("token has expired")]
    Expired,
}

impl TokenError {
    /// Signature and algorithm failures both mean the token was not minted by
    /// this service.
    pub fn is_signature_fault(&self) -> bool {
        matches!(self, TokenError::Signature | TokenError::Algorithm(_))
    }
}

/// Issues and validates signed identity tokens.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    settings: SignerSettings,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Load a PKCS#8 private key and SPKI public key (PEM) from disk.
    pub fn from_pem_files(
        private_key: impl AsRef<Path>,
        public_key: impl AsRef<Path>,
        settings: SignerSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, KeyError> {
        let private_pem = read_key(private_key.as_ref())?;
        let public_pem = read_key(public_key.as_ref())?;
        Self::from_pem(&private_pem, &public_pem, settings, clock)
    }

    pub fn from_pem(
        private_pem: &[u8],
        public_pem: &[u8],
        settings: SignerSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, KeyError> {
        let encoding = EncodingKey::from_ed_pem(private_pem).map_err(|source| KeyError::Parse {
            which: "private",
            source,
        })?;
        let decoding = DecodingKey::from_ed_pem(public_pem).map_err(|source| KeyError::Parse {
            which: "public",
            source,
        })?;

        let probe = b"campusid-key-probe";
        let signature = jsonwebtoken::crypto::sign(probe, &encoding, ALGORITHM)
            .map_err(|source| KeyError::Parse {
                which: "private",
                source,
            })?;
        if !jsonwebtoken::crypto::verify(&signature, probe, &decoding, ALGORITHM).unwrap_or(false) {
            return Err(KeyError::Mismatch);
        }

        let mut validation = Validation::new(ALGORITHM);
        // Expiry is checked against the injected clock in `validate_token`.
        validation.validate_exp = false;
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_audience(&[settings.audience.as_str()]);
        validation.required_spec_claims =
            HashSet::from(["exp".to_string(), "iss".to_string(), "aud".to_string()]);

        Ok(Self {
            encoding,
            decoding,
            settings,
            validation,
            clock,
        })
    }

    pub fn settings(&self) -> &SignerSettings {
        &self.settings
    }

    /// Mint a token carrying `payload`, valid for `ttl` from now.
    #[instrument(skip(self, payload), err)]
    pub fn issue_token(&self, payload: &str, ttl: Duration) -> Result<String, SigningError> {
        if ttl <= Duration::zero() {
            return Err(SigningError::InvalidTtl);
        }

        let now = self.clock.now();
        let expires_at = now.checked_add_signed(ttl).ok_or(SigningError::InvalidTtl)?;
        let claims = TokenClaims {
            payload: payload.to_string(),
            iss: self.settings.issuer.clone(),
            aud: self.settings.audience.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        jsonwebtoken::encode(&Header::new(ALGORITHM), &claims, &self.encoding).map_err(|e| {
            error!(error = %e, "failed to sign session token");
            SigningError::Sign(e)
        })
    }

    /// Verify `token` and return its claims.
    pub fn validate_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let (message, signature) = token.rsplit_once('.').ok_or(TokenError::Signature)?;
        let verified = jsonwebtoken::crypto::verify(signature, message.as_bytes(), &self.decoding, ALGORITHM)
            .unwrap_or(false);
        if !verified {
            return Err(TokenError::Signature);
        }

        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| TokenError::Claims(format!("header: {e}")))?;
        if header.alg != ALGORITHM {
            return Err(TokenError::Algorithm(format!("{:?}", header.alg)));
        }

        let claims = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map_err(map_decode_error)?
            .claims;

        validate_claims(&claims, self.clock.now()).map_err(|e| match e {
            ClaimWindowError::Expired => TokenError::Expired,
            other => TokenError::Claims(other.to_string()),
        })?;

        Ok(claims)
    }
}

fn read_key(path: &Path) -> Result<Vec<u8>, KeyError> {
    std::fs::read(path).map_err(|source| KeyError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::Signature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName | ErrorKind::MissingAlgorithm => {
            TokenError::Algorithm(err.to_string())
        }
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Claims(err.to_string()),
    }
}

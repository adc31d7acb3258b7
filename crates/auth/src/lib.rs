//! `campusid-auth` — token signing, credential hashing and the permission set.
//!
//! Nothing here touches storage or HTTP.

pub mod claims;
pub mod password;
pub mod permissions;
pub mod signer;

pub use claims::{ClaimWindowError, TokenClaims, validate_claims};
pub use password::{MIN_PASSWORD_LEN, PasswordError, hash_password, meets_policy, verify_password};
pub use permissions::{Permission, Permissions};
pub use signer::{KeyError, SignerSettings, SigningError, TokenError, TokenSigner};

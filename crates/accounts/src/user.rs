use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campusid_auth::{Permission, Permissions};
use campusid_core::{DomainError, UserId};

/// Minimum display name length, in characters.
pub const MIN_DISPLAY_NAME_LEN: usize = 4;

/// An account.
///
/// `password_hash` is an Argon2 PHC string and is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub display_name: String,
    pub permissions: Permissions,
    pub active: bool,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to insert a freshly registered account.
///
/// New accounts always start inactive and unverified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub permissions: Permissions,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            email: self.email,
            password_hash: None,
            display_name: self.display_name,
            permissions: self.permissions,
            active: false,
            verified: false,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// A single, typed mutation of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserChange {
    /// Confirmation link consumed: active and verified.
    Activation,
    Deactivation,
    /// Reactivation link consumed: active again, verification untouched.
    Reactivation,
    Password { hash: String },
    Profile(ProfileUpdate),
    /// Set one flag on whatever the stored set holds at write time.
    GrantPermission(Permission),
    /// Clear one flag on whatever the stored set holds at write time.
    RevokePermission(Permission),
}

impl UserChange {
    pub fn kind(&self) -> &'static str {
        match self {
            UserChange::Activation => "activation",
            UserChange::Deactivation => "deactivation",
            UserChange::Reactivation => "reactivation",
            UserChange::Password { .. } => "password",
            UserChange::Profile(_) => "profile",
            UserChange::GrantPermission(_) => "grant_permission",
            UserChange::RevokePermission(_) => "revoke_permission",
        }
    }

    pub fn apply(&self, user: &mut User, at: DateTime<Utc>) {
        match self {
            UserChange::Activation => {
                user.active = true;
                user.verified = true;
            }
            UserChange::Deactivation => user.active = false,
            UserChange::Reactivation => user.active = true,
            UserChange::Password { hash } => user.password_hash = Some(hash.clone()),
            UserChange::Profile(update) => user.display_name = update.display_name.clone(),
            UserChange::GrantPermission(flag) => user.permissions.assign(*flag),
            UserChange::RevokePermission(flag) => user.permissions.revoke(*flag),
        }
        user.updated_at = at;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: String,
}

impl ProfileUpdate {
    /// Trim and check the display name.
    pub fn new(display_name: &str) -> Result<Self, DomainError> {
        let display_name = display_name.trim();
        if display_name.chars().count() < MIN_DISPLAY_NAME_LEN {
            return Err(DomainError::validation(format!(
                "display name must be at least {MIN_DISPLAY_NAME_LEN} characters"
            )));
        }
        Ok(Self {
            display_name: display_name.to_string(),
        })
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        u64::from(self.page) * u64::from(self.page_size) < self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        NewUser {
            id: UserId::new(),
            email: "ivanov_a@auca.kg".into(),
            display_name: "ivanov".into(),
            permissions: Permissions::NONE,
            created_at: DateTime::from_timestamp(1_000, 0).unwrap(),
        }
        .into_user()
    }

    #[test]
    fn new_user_starts_inactive_and_unverified() {
        let u = user();
        assert!(!u.active);
        assert!(!u.verified);
        assert!(u.password_hash.is_none());
        assert_eq!(u.created_at, u.updated_at);
    }

    #[test]
    fn reactivation_leaves_verification_alone() {
        let mut u = user();
        let at = DateTime::from_timestamp(2_000, 0).unwrap();
        UserChange::Reactivation.apply(&mut u, at);
        assert!(u.active);
        assert!(!u.verified);
        assert_eq!(u.updated_at, at);

        UserChange::Deactivation.apply(&mut u, at);
        UserChange::Activation.apply(&mut u, at);
        assert!(u.active && u.verified);
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let mut u = user();
        let at = u.created_at;
        UserChange::Password { hash: "$argon2id$secret".into() }.apply(&mut u, at);
        let json = serde_json::to_string(&u).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("password_hash"));
    }

    #[test]
    fn permission_changes_edit_the_current_set() {
        let mut u = user();
        let at = u.created_at;
        UserChange::GrantPermission(Permission::Student).apply(&mut u, at);
        UserChange::GrantPermission(Permission::Admin).apply(&mut u, at);
        assert_eq!(u.permissions, Permissions::new(&[Permission::Student, Permission::Admin]));

        UserChange::RevokePermission(Permission::Student).apply(&mut u, at);
        UserChange::RevokePermission(Permission::Admin).apply(&mut u, at);
        assert_eq!(u.permissions, Permissions::NONE);
    }

    #[test]
    fn profile_update_requires_four_characters() {
        assert!(ProfileUpdate::new("  abc ").is_err());
        assert_eq!(ProfileUpdate::new(" abcd ").unwrap().display_name, "abcd");
    }

    #[test]
    fn page_knows_when_more_remain() {
        let page = Page::<u8> { items: vec![], total: 21, page: 2, page_size: 10 };
        assert!(page.has_more());
        let last = Page::<u8> { items: vec![], total: 20, page: 2, page_size: 10 };
        assert!(!last.has_more());
    }
}

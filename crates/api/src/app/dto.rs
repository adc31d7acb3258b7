use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campusid_accounts::{LinkIntent, Page, User, VerificationLink};
use campusid_auth::Permission;
use campusid_core::{LinkId, UserId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub code: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub permissions: Vec<Permission>,
    pub permissions_label: String,
    pub active: bool,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            permissions: user.permissions.iter().collect(),
            permissions_label: user.permissions.render(),
            active: user.active,
            verified: user.verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserResponse,
}

/// Link metadata for operators. The code itself is never returned.
#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub id: LinkId,
    pub intent: LinkIntent,
    pub expires_at: DateTime<Utc>,
    pub utilised: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&VerificationLink> for LinkResponse {
    fn from(link: &VerificationLink) -> Self {
        Self {
            id: link.id,
            intent: link.intent,
            expires_at: link.expires_at,
            utilised: link.utilised,
            created_at: link.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}

impl From<Page<User>> for PageResponse<UserResponse> {
    fn from(page: Page<User>) -> Self {
        Self {
            has_more: page.has_more(),
            items: page.items.iter().map(UserResponse::from).collect(),
            total: page.total,
            page: page.page,
            page_size: page.page_size,
        }
    }
}

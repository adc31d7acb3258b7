//! Account administration. Every route here requires the admin permission.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use tracing::info;

use campusid_auth::Permission;
use campusid_core::UserId;

use crate::app::{dto, errors, services::AppServices};
use crate::context::SessionContext;

const DEFAULT_PAGE_SIZE: u32 = 20;

pub fn router() -> Router {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/by-email", get(find_user))
        .route("/admin/users/:id", get(get_user))
        .route("/admin/users/:id/links", get(list_links))
        .route("/admin/users/:id/deactivate", post(deactivate_user))
        .route(
            "/admin/users/:id/permissions/:flag",
            put(grant_permission).delete(revoke_permission),
        )
}

fn parse_user_id(raw: &str) -> Result<UserId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id"))
}

fn parse_permission(raw: &str) -> Result<Permission, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_permission",
            "permission must be one of: student, moderator, developer, maintainer, admin",
        )
    })
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::PageQuery>,
) -> axum::response::Response {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    match services.accounts.list_users(page, page_size).await {
        Ok(page) => Json(dto::PageResponse::from(page)).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn find_user(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::EmailQuery>,
) -> axum::response::Response {
    match services.accounts.get_user_by_email(&query.email).await {
        Ok(user) => Json(dto::UserResponse::from(&user)).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.accounts.get_user(id).await {
        Ok(user) => Json(dto::UserResponse::from(&user)).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn list_links(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.accounts.list_links(id).await {
        Ok(links) => Json(links.iter().map(dto::LinkResponse::from).collect::<Vec<_>>()).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.accounts.deactivate_account(id).await {
        Ok(user) => {
            info!(admin_id = %session.user().id, user_id = %user.id, "account deactivated by administrator");
            Json(dto::UserResponse::from(&user)).into_response()
        }
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn grant_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path((id, flag)): Path<(String, String)>,
) -> axum::response::Response {
    let (id, flag) = match (parse_user_id(&id), parse_permission(&flag)) {
        (Ok(id), Ok(flag)) => (id, flag),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };
    match services.accounts.grant_permission(id, flag).await {
        Ok(user) => {
            info!(admin_id = %session.user().id, user_id = %user.id, permission = %flag, "permission granted");
            Json(dto::UserResponse::from(&user)).into_response()
        }
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn revoke_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path((id, flag)): Path<(String, String)>,
) -> axum::response::Response {
    let (id, flag) = match (parse_user_id(&id), parse_permission(&flag)) {
        (Ok(id), Ok(flag)) => (id, flag),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };
    if id == session.user().id && flag == Permission::Admin {
        return errors::json_error(
            StatusCode::CONFLICT,
            "self_demotion",
            "administrators cannot revoke their own admin permission",
        );
    }
    match services.accounts.revoke_permission(id, flag).await {
        Ok(user) => {
            info!(admin_id = %session.user().id, user_id = %user.id, permission = %flag, "permission revoked");
            Json(dto::UserResponse::from(&user)).into_response()
        }
        Err(e) => errors::account_error_to_response(e),
    }
}

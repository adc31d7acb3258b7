//! Registration, confirmation, reactivation and password reset.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use crate::app::{dto, errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register))
        .route("/verify", post(verify))
        .route("/reactivate", post(reactivate))
        .route("/password-reset", post(request_password_reset))
        .route("/password", post(set_password))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::EmailRequest>,
) -> axum::response::Response {
    match services.accounts.register(&body.email).await {
        Ok(user) => (StatusCode::CREATED, Json(dto::UserResponse::from(&user))).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn verify(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CodeRequest>,
) -> axum::response::Response {
    match services.accounts.validate_user(&body.code).await {
        Ok(user) => Json(dto::UserResponse::from(&user)).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn reactivate(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::EmailRequest>,
) -> axum::response::Response {
    match services.accounts.reactivate_account(&body.email).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn request_password_reset(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::EmailRequest>,
) -> axum::response::Response {
    match services.accounts.request_new_password(&body.email).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn set_password(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SetPasswordRequest>,
) -> axum::response::Response {
    match services.accounts.set_new_password(&body.password, &body.code).await {
        Ok(user) => Json(dto::UserResponse::from(&user)).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

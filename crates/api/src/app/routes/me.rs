//! The caller's own account.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    response::IntoResponse,
    routing::{get, post},
};

use crate::app::{dto, errors, services::AppServices};
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_me).patch(update_me))
        .route("/deactivate", post(deactivate_me))
}

pub async fn get_me(Extension(session): Extension<SessionContext>) -> axum::response::Response {
    Json(dto::UserResponse::from(session.user())).into_response()
}

pub async fn update_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Json(body): Json<dto::UpdateProfileRequest>,
) -> axum::response::Response {
    match services
        .accounts
        .update_profile(session.user().id, &body.display_name)
        .await
    {
        Ok(user) => Json(dto::UserResponse::from(&user)).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn deactivate_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
) -> axum::response::Response {
    match services.accounts.deactivate_account(session.user().id).await {
        Ok(user) => Json(dto::UserResponse::from(&user)).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

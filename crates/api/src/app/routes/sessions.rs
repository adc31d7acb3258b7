use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};
use tracing::info;

use crate::app::{dto, errors, services::AppServices};

/// Exchange credentials for a signed session token.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let user = match services.accounts.authenticate(&body.email, &body.password).await {
        Ok(user) => user,
        Err(e) => return errors::account_error_to_response(e),
    };

    let token = match services
        .signer
        .issue_token(&user.id.to_string(), services.session_ttl)
    {
        Ok(token) => token,
        Err(e) => return errors::signing_error_to_response(e),
    };

    info!(user_id = %user.id, "session issued");
    Json(dto::SessionResponse {
        token,
        token_type: "Bearer",
        expires_in: services.session_ttl.num_seconds(),
        user: dto::UserResponse::from(&user),
    })
    .into_response()
}

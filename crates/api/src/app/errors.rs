use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use campusid_accounts::AccountError;
use campusid_auth::{SigningError, TokenError};

pub fn account_error_to_response(err: AccountError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        AccountError::NonInstitutionalEmail => {
            json_error(StatusCode::BAD_REQUEST, "non_institutional_email", message)
        }
        AccountError::WeakPassword(_) => json_error(StatusCode::BAD_REQUEST, "weak_password", message),
        AccountError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        AccountError::LinkIntentMismatch => json_error(StatusCode::BAD_REQUEST, "wrong_link_kind", message),
        AccountError::UserNotFound => json_error(StatusCode::NOT_FOUND, "user_not_found", message),
        AccountError::LinkNotFound => json_error(StatusCode::NOT_FOUND, "link_not_found", message),
        AccountError::LinkExpired => json_error(StatusCode::GONE, "link_expired", message),
        AccountError::AlreadyRegistered => json_error(StatusCode::CONFLICT, "already_registered", message),
        AccountError::AlreadyActive => json_error(StatusCode::CONFLICT, "already_active", message),
        AccountError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", message)
        }
        AccountError::AccountInactive => json_error(StatusCode::FORBIDDEN, "account_inactive", message),
        AccountError::Store(e) => {
            error!(error = %e, "account store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal error")
        }
        AccountError::Credential(e) => {
            error!(error = %e, "credential hashing failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "credential_error", "internal error")
        }
    }
}

pub fn token_error_to_response(err: TokenError) -> axum::response::Response {
    let code = match &err {
        TokenError::Signature | TokenError::Algorithm(_) => "invalid_signature",
        TokenError::Claims(_) => "invalid_claims",
        TokenError::Expired => "token_expired",
    };
    json_error(StatusCode::UNAUTHORIZED, code, err.to_string())
}

pub fn signing_error_to_response(err: SigningError) -> axum::response::Response {
    error!(error = %err, "failed to sign session token");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "signing_error", "internal error")
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

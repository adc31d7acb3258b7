use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use campusid_accounts::AccountError;
use campusid_auth::Permission;
use campusid_core::UserId;

use crate::app::AppServices;
use crate::app::errors::{account_error_to_response, json_error, token_error_to_response};
use crate::context::SessionContext;

/// Validate the bearer session token and attach the caller's account.
///
/// Tokens of deactivated accounts stop working immediately, even before
/// they expire.
pub async fn auth_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())
        .map_err(|status| json_error(status, "missing_token", "bearer token required"))?;

    let claims = services.signer.validate_token(token).map_err(|e| {
        debug!(error = %e, "session token rejected");
        token_error_to_response(e)
    })?;

    let user_id: UserId = claims
        .payload
        .parse()
        .map_err(|_| json_error(StatusCode::UNAUTHORIZED, "invalid_claims", "token subject is malformed"))?;

    let user = match services.accounts.get_user(user_id).await {
        Ok(user) => user,
        Err(AccountError::UserNotFound) => {
            return Err(json_error(StatusCode::UNAUTHORIZED, "invalid_claims", "token subject is unknown"));
        }
        Err(e) => return Err(account_error_to_response(e)),
    };
    if !user.active {
        return Err(account_error_to_response(AccountError::AccountInactive));
    }

    let expires_at = claims.expires_at();
    req.extensions_mut()
        .insert(SessionContext::new(user, claims.jti, expires_at));

    Ok(next.run(req).await)
}

/// Only account administrators may pass. Runs after [`auth_middleware`].
pub async fn require_admin(
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let is_admin = req
        .extensions()
        .get::<SessionContext>()
        .is_some_and(|session| session.user().permissions.has(Permission::Admin));
    if !is_admin {
        return Err(json_error(StatusCode::FORBIDDEN, "forbidden", "administrator permission required"));
    }
    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum::http::header::AUTHORIZATION;

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi "));
        assert_eq!(extract_bearer(&headers), Ok("abc.def.ghi"));
    }

    #[test]
    fn other_schemes_are_rejected() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_bearer(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_bearer(&headers), Err(StatusCode::UNAUTHORIZED));
    }
}

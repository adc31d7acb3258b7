use axum::{
    Router,
    routing::{get, post},
};

pub mod accounts;
pub mod admin;
pub mod me;
pub mod sessions;
pub mod system;

/// Unauthenticated lifecycle endpoints.
pub fn public_router() -> Router {
    Router::new()
        .nest("/accounts", accounts::router())
        .route("/sessions", post(sessions::login))
}

/// Endpoints for the holder of a valid session token.
pub fn protected_router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/me", me::router())
}

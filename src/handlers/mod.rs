//! # HTTP Request Handlers
//!
//! Thin translation layer: each handler extracts the request body, calls the
//! [`AuthGateway`](crate::gateway::AuthGateway) and turns the outcome into
//! JSON. Errors become responses through `AppError`'s `IntoResponse`.
//!
//! ## Submodules
//! - `health`: liveness check
//! - `auth`: account creation, both ceremonies and logout
//! - `users`: the authenticated user's profile
//! - `extract`: JSON extractor reporting errors in the API's shape

pub mod auth;
pub mod extract;
pub mod health;
pub mod users;

use crate::middleware::auth::require_auth;
use crate::state::AppState;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/api/auth/me", get(users::get_current_user))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/register", post(auth::register))
        .route(
            "/api/auth/webauthn/registration/start",
            post(auth::registration_start),
        )
        .route(
            "/api/auth/webauthn/registration/complete",
            post(auth::registration_complete),
        )
        .route(
            "/api/auth/webauthn/authentication/start",
            post(auth::authentication_start),
        )
        .route(
            "/api/auth/webauthn/authentication/complete",
            post(auth::authentication_complete),
        )
        .route("/api/auth/logout", post(auth::logout))
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

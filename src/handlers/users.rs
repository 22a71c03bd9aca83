//! # User Handlers

use crate::middleware::auth::CurrentUser;
use axum::{Extension, Json};
use serde_json::{json, Value};

/// Get the authenticated user's profile
///
/// ## Route
/// GET /api/auth/me
///
/// ## Response
/// ```json
/// {
///   "user_id": "550e8400-e29b-41d4-a716-446655440000",
///   "email": "alice@example.com",
///   "profile": { "display_name": "Alice", "timezone": "UTC", ... }
/// }
/// ```
///
/// The identity was resolved by `require_auth`; credential ids and keys are
/// never returned.
pub async fn get_current_user(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<Value> {
    Json(json!({
        "user_id": user.id,
        "email": user.email,
        "profile": user.profile,
        "created_at": user.created_at
    }))
}

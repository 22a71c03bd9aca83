use super::extract::AppJson;
use crate::error::AppResult;
use crate::gateway::LoginResponse;
use crate::state::AppState;
use crate::webauthn::types::*;
use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

// Account

pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let user = state.gateway.register(&req.email, &req.display_name).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user_id: user.id,
        }),
    ))
}

// Registration ceremony

pub async fn registration_start(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegistrationStartRequest>,
) -> AppResult<Json<CeremonyOptions>> {
    let options = state
        .gateway
        .begin_registration(&req.user_id, &req.email, &req.display_name)
        .await?;

    Ok(Json(options))
}

pub async fn registration_complete(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegistrationFinishRequest>,
) -> AppResult<Json<Value>> {
    let credential = state
        .gateway
        .complete_registration(&req.user_id, &req.challenge_id, &req.credential)
        .await?;

    Ok(Json(json!({
        "success": true,
        "credential_id": credential.credential_id,
        "message": "Passkey registered"
    })))
}

// Authentication ceremony

pub async fn authentication_start(
    State(state): State<AppState>,
    AppJson(req): AppJson<AuthenticationStartRequest>,
) -> AppResult<Json<CeremonyOptions>> {
    let options = state.gateway.begin_authentication(&req.email).await?;

    Ok(Json(options))
}

pub async fn authentication_complete(
    State(state): State<AppState>,
    AppJson(req): AppJson<AuthenticationFinishRequest>,
) -> AppResult<Json<LoginResponse>> {
    let login = state
        .gateway
        .complete_authentication(&req.email, &req.challenge_id, &req.credential)
        .await?;

    Ok(Json(login))
}

/// Tokens are stateless, so logging out is the client discarding its token
pub async fn logout() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Logged out successfully"
    }))
}

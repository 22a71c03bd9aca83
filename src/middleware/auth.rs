use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;
use crate::token::extract_bearer;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

/// Identity of the caller, inserted into request extensions by `require_auth`
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = extract_bearer(header).ok_or(AppError::Unauthenticated)?;
    let user = state.gateway.current_identity(token).await?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

//! Request extractors shared by the handlers

use crate::error::AppError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;

/// `Json<T>` whose rejections use the API's error body
///
/// Malformed JSON, a missing content type or a body of the wrong shape all
/// become `AppError::BadRequest`, so clients only ever see
/// `{ "error", "message" }`.
pub struct AppJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                tracing::debug!(status = %rejection.status(), "request body rejected");
                Err(AppError::BadRequest(rejection.body_text()))
            }
        }
    }
}

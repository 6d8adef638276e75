use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};

use crate::api::handlers::ErrorResponse;

/// JSON body extractor whose rejection is a 400 `invalid_body` error in the
/// API's own error shape, keeping 422 for `too_many_combinations`
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for RequestJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(RequestJson(value)),
            Err(rejection) => Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::with_code(&rejection.body_text(), "invalid_body")),
            )),
        }
    }
}

//! `ValidatedJson<T>`: `axum::Json<T>` followed by `validator::Validate`
//!
//! Malformed or mistyped JSON is rejected with 400, a body that parses
//! but fails validation with 422 and a field-level message.

use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use validator::Validate;

use super::{api_error, invalid_json, validation_message, ApiError};

pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(invalid_json)?;

        value.validate().map_err(|errors| {
            api_error(StatusCode::UNPROCESSABLE_ENTITY, validation_message(&errors))
        })?;

        Ok(ValidatedJson(value))
    }
}

// ── Tests ──────────────────────────────────────────────────────

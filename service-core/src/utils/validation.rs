use crate::error::AppError;
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::header,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError, ValidationErrors};

/// JSON body that has been deserialized and validated.
///
/// A body that parses but does not fit the target type (bad date, missing
/// field) is a 422 with the serde message under `details.body`. Syntax
/// errors and a missing JSON content type are 400. Rule violations are the
/// usual 422 from [`Validate`].
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}

/// [`ValidatedJson`] for endpoints whose body is optional: a request without
/// a `Content-Type` yields `T::default()`.
pub struct ValidatedJsonOrDefault<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJsonOrDefault<T>
where
    T: DeserializeOwned + Validate + Default + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !req.headers().contains_key(header::CONTENT_TYPE) {
            return Ok(ValidatedJsonOrDefault(T::default()));
        }

        let ValidatedJson(value) = ValidatedJson::<T>::from_request(req, state).await?;
        Ok(ValidatedJsonOrDefault(value))
    }
}

pub fn json_rejection(rejection: JsonRejection) -> AppError {
    match rejection {
        JsonRejection::JsonDataError(e) => {
            let mut error = ValidationError::new("invalid_body");
            error.message = Some(e.body_text().into());
            let mut errors = ValidationErrors::new();
            errors.add("body", error);
            AppError::ValidationError(errors)
        }
        other => AppError::BadRequest(anyhow::anyhow!(other.body_text())),
    }
}

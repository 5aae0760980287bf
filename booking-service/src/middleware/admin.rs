//! Admin authentication.
//!
//! Admin routes require `Authorization: Bearer <ADMIN_API_TOKEN>`. The token
//! is compared in constant time. With no token configured the admin surface
//! is closed rather than open.

use crate::startup::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::utils::signature::signatures_match;

/// Proof that the request carried the admin token.
#[derive(Debug, Clone, Copy)]
pub struct AdminContext;

#[async_trait]
impl FromRequestParts<AppState> for AdminContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .config
            .admin
            .api_token
            .as_ref()
            .map(|t| t.expose_secret().as_str())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::ServiceUnavailable("Admin API is not configured".to_string())
            })?;

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AppError::Unauthorized(anyhow::anyhow!("Missing bearer token"))
                })?;

        if !signatures_match(expected, bearer.token()) {
            tracing::warn!(path = %parts.uri.path(), "Rejected admin request with wrong token");
            return Err(AppError::Forbidden(anyhow::anyhow!("Invalid admin token")));
        }

        Ok(AdminContext)
    }
}

use crate::error::ApiError;
use crate::state::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::sync::Arc;

/// The authenticated caller, extracted from the bearer token.
pub struct AuthUser {
    pub user_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected bearer token".to_string()))?;

        let claims = state
            .verifier
            .verify(token)
            .map_err(|e| ApiError::Unauthorized(format!("invalid token: {}", e)))?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

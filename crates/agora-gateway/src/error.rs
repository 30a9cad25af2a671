use agora_persist::PersistError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient credits")]
    PaymentRequired,

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            Self::ThreadNotFound(_) => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<PersistError> for ApiError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::ThreadNotFound(id) => Self::ThreadNotFound(id),
            PersistError::InvalidObjectId(_) => Self::BadRequest(err.to_string()),
            PersistError::InsufficientCredits { .. } => Self::PaymentRequired,
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_variants() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::PaymentRequired.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(
            ApiError::ThreadNotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn insufficient_credits_maps_to_402() {
        let err = ApiError::from(PersistError::InsufficientCredits {
            user_id: "u1".into(),
            needed: 100,
            available: 5,
        });
        assert_eq!(err.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn error_response_has_json_body() {
        let response = ApiError::Unauthorized("no token".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

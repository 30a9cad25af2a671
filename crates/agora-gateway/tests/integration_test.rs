use agora_gateway::auth::jwt::{issue_token, JwtVerifier};
use agora_gateway::error::ApiError;
use axum::http::StatusCode;
use axum::response::IntoResponse;

#[test]
fn api_errors_map_to_http_statuses() {
    let cases = [
        (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
        (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
        (ApiError::PaymentRequired, StatusCode::PAYMENT_REQUIRED),
        (ApiError::ThreadNotFound("x".into()), StatusCode::NOT_FOUND),
        (
            ApiError::ServiceUnavailable("x".into()),
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (
            ApiError::Internal("x".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (error, expected) in cases {
        assert_eq!(error.into_response().status(), expected);
    }
}

#[tokio::test]
async fn bearer_tokens_round_trip_through_the_verifier() {
    let token = issue_token("test-secret", "user-7", chrono::Duration::hours(1)).unwrap();
    let claims = JwtVerifier::new("test-secret").verify(&token).unwrap();

    assert_eq!(claims.sub, "user-7");
    assert!(claims.expires_at() > chrono::Utc::now());
}

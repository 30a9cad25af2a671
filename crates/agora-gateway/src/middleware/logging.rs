use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;

/// Request log line with method, path, status and latency.
pub async fn log_request(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    if status.is_server_error() {
        tracing::error!(%method, %path, %status, elapsed_ms, "request failed");
    } else {
        tracing::info!(%method, %path, %status, elapsed_ms, "request");
    }

    response
}

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Logs every request with its status and duration; level follows the status class.
pub async fn log_route_access(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if response.status().is_server_error() {
        tracing::error!(method = %method, path = %path, status, duration_ms);
    } else if response.status().is_client_error() {
        tracing::warn!(method = %method, path = %path, status, duration_ms);
    } else {
        tracing::info!(method = %method, path = %path, status, duration_ms);
    }

    response
}

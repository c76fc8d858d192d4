//! services/api/src/web/middleware.rs
//!
//! Request logging middleware applied to every route.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

/// Logs the method, path, status and latency of each request.
///
/// Server errors are logged at `warn`; everything else at `info`.
pub async fn trace_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis();
    if status.is_server_error() {
        warn!("{} {} -> {} ({} ms)", method, path, status, elapsed_ms);
    } else {
        info!("{} {} -> {} ({} ms)", method, path, status, elapsed_ms);
    }
    response
}

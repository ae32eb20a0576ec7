use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use std::time::Instant;

/// Stamps `X-Response-Time-Us` on every response and logs the request.
///
/// For `/ws` the measured time covers the upgrade handshake only; the
/// sample stream that follows runs outside the middleware.
pub async fn timing_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let start = Instant::now();
    let mut response = next.run(req).await;
    let us = start.elapsed().as_micros() as u64;

    response
        .headers_mut()
        .insert("X-Response-Time-Us", us.into());

    if response.status() == StatusCode::SWITCHING_PROTOCOLS {
        tracing::info!(path, handshake_us = us, "websocket upgrade accepted");
    } else {
        tracing::debug!(%method, path, status = response.status().as_u16(), us, "request");
    }

    response
}

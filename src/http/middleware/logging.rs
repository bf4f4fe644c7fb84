//! Request logging.
//!
//! Emits one info event per inbound request before dispatch and runs the
//! rest of the chain inside a span carrying a fresh request ID. The request
//! and response pass through untouched.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::observability::metrics;

pub async fn log_request(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let peer_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    metrics::record_request(request.method().as_str());
    tracing::info!(
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
        version = ?request.version(),
        peer_addr = ?peer_addr,
        "request"
    );

    let span = tracing::info_span!("request", request_id = %request_id);
    next.run(request).instrument(span).await
}

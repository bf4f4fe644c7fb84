//! Panic containment.
//!
//! Runs outermost in the pipeline. A panic anywhere below it, in a handler
//! or in another interceptor, becomes a 500 JSON response and the
//! connection is closed instead of being reused.

use std::any::Any;

use axum::{
    body::Body,
    http::{header, HeaderValue, Response, StatusCode},
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::observability::metrics;

/// Message used when a panic payload is neither a string nor an error.
pub const UNKNOWN_PANIC: &str = "panic payload of unknown type";

/// Layer converting handler panics into 500 responses.
pub fn layer() -> CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response<Body>> {
    CatchPanicLayer::custom(handle_panic as fn(Box<dyn Any + Send + 'static>) -> Response<Body>)
}

/// Normalize a panic payload to a message.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(err) = payload.downcast_ref::<Box<dyn std::error::Error + Send + Sync>>() {
        err.to_string()
    } else {
        UNKNOWN_PANIC.to_string()
    }
}

/// JSON body sent with every recovered panic.
pub fn error_body() -> String {
    let details = StatusCode::INTERNAL_SERVER_ERROR
        .canonical_reason()
        .unwrap_or("Internal Server Error");
    serde_json::json!({ "details": details }).to_string()
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let message = panic_message(payload.as_ref());
    tracing::error!(err.message = %message, "panic");
    metrics::record_panic();

    let built = Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .header(header::CONNECTION, HeaderValue::from_static("close"))
        .body(Body::from(error_body()));

    match built {
        Ok(response) => response,
        Err(err) => {
            // Best effort: log and fall back to a bare 500.
            tracing::error!(error = %err, "write panic response");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

//! Readiness probe handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::health::state::ReadinessGate;

/// Route the probe is served on.
pub const HEALTHZ_PATH: &str = "/healthz";

/// Body returned while the server accepts traffic.
pub const READY_BODY: &str = "OK";

/// Body returned once shutdown has begun.
pub const SHUTTING_DOWN_BODY: &str = "shutting down";

/// `GET /healthz`
///
/// Returns 200 while the gate is open and 503 once shutdown has begun.
/// Reads nothing but the gate; no I/O, no locks.
pub async fn healthz(State(readiness): State<ReadinessGate>) -> impl IntoResponse {
    if readiness.is_ready() {
        (StatusCode::OK, READY_BODY)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, SHUTTING_DOWN_BODY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::response::Response;

    async fn call(gate: &ReadinessGate) -> (StatusCode, String) {
        let response: Response = healthz(State(gate.clone())).await.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn ok_while_ready() {
        let gate = ReadinessGate::new();
        assert_eq!(call(&gate).await, (StatusCode::OK, "OK".to_string()));
    }

    #[tokio::test]
    async fn unavailable_after_mark_not_ready() {
        let gate = ReadinessGate::new();
        gate.mark_not_ready();
        assert_eq!(
            call(&gate).await,
            (StatusCode::SERVICE_UNAVAILABLE, "shutting down".to_string())
        );
    }
}

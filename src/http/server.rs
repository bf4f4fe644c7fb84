//! HTTP pipeline setup.
//!
//! # Responsibilities
//! - Register `/healthz` against the readiness gate
//! - Merge business routes registered by the application
//! - Hand every request the shared "ongoing work" token
//! - Wrap everything in the interceptor chain

use axum::{routing::get, Extension, Router};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;

use crate::health::{healthz, ReadinessGate, HEALTHZ_PATH};
use crate::http::middleware::{self, log_request};

/// Cancellation token shared by all request-scoped background work.
///
/// Canceled once, at the end of the shutdown sequence. Handlers extract it
/// with `Extension<OngoingWork>` and can only observe it.
#[derive(Debug, Clone)]
pub struct OngoingWork(CancellationToken);

impl OngoingWork {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self(token)
    }

    /// Token for a piece of background work. Canceling it stops only that
    /// work; it is canceled with the server all the same.
    pub fn child_token(&self) -> CancellationToken {
        self.0.child_token()
    }

    /// Resolves when the server has finished shutting down.
    pub async fn cancelled(&self) {
        self.0.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Builder for the request pipeline.
///
/// The interceptor chain is composed once in [`Pipeline::build`] and is
/// immutable afterwards.
pub struct Pipeline {
    readiness: ReadinessGate,
    ongoing: CancellationToken,
    routes: Router,
}

impl Pipeline {
    /// Create a pipeline serving only the health probe.
    pub fn new(readiness: ReadinessGate, ongoing: CancellationToken) -> Self {
        Self {
            readiness,
            ongoing,
            routes: Router::new(),
        }
    }

    /// Register application routes. They share the interceptor chain.
    pub fn with_routes(mut self, routes: Router) -> Self {
        self.routes = self.routes.merge(routes);
        self
    }

    /// Compose the final router.
    pub fn build(self) -> Router {
        let health = Router::new()
            .route(HEALTHZ_PATH, get(healthz))
            .with_state(self.readiness);

        health
            .merge(self.routes)
            .layer(Extension(OngoingWork::new(self.ongoing)))
            .layer(
                ServiceBuilder::new()
                    .layer(middleware::panic::layer())
                    .layer(axum::middleware::from_fn(log_request))
                    .layer(middleware::headers::server_header()),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::headers::SERVER_HEADER;
    use axum::{
        body::Body,
        extract::Request,
        http::{header, StatusCode},
        middleware::Next,
        response::Response,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get_request(path: &str) -> Request {
        axum::http::Request::builder()
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    async fn exploding_handler() -> &'static str {
        panic!("handler exploded")
    }

    async fn exploding_middleware(_request: Request, _next: Next) -> Response {
        panic!("middleware exploded")
    }

    async fn ongoing_state(Extension(ongoing): Extension<OngoingWork>) -> String {
        ongoing.is_cancelled().to_string()
    }

    async fn abandon_work(Extension(ongoing): Extension<OngoingWork>) -> &'static str {
        ongoing.child_token().cancel();
        "abandoned"
    }

    fn pipeline() -> (ReadinessGate, CancellationToken, Router) {
        let gate = ReadinessGate::new();
        let token = CancellationToken::new();
        let routes = Router::new()
            .route("/panic", get(exploding_handler))
            .route("/ongoing", get(ongoing_state))
            .route("/abandon", get(abandon_work))
            .merge(
                Router::new()
                    .route("/guarded", get(|| async { "unreachable" }))
                    .layer(axum::middleware::from_fn(exploding_middleware)),
            );
        let router = Pipeline::new(gate.clone(), token.clone())
            .with_routes(routes)
            .build();
        (gate, token, router)
    }

    #[tokio::test]
    async fn healthz_ok_with_server_header() {
        let (_, _, router) = pipeline();
        let response = router.oneshot(get_request("/healthz")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::SERVER], SERVER_HEADER);
        assert_eq!(body_string(response).await, "OK");
    }

    #[tokio::test]
    async fn healthz_unavailable_after_gate_closes() {
        let (gate, _, router) = pipeline();
        gate.mark_not_ready();

        let response = router.oneshot(get_request("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_string(response).await, "shutting down");
    }

    #[tokio::test]
    async fn handler_panic_becomes_500() {
        let (_, _, router) = pipeline();

        let response = router.clone().oneshot(get_request("/panic")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONNECTION], "close");
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["details"], "Internal Server Error");

        // The router keeps serving afterwards.
        let response = router.oneshot(get_request("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn interceptor_panic_is_contained() {
        let (_, _, router) = pipeline();
        let response = router.oneshot(get_request("/guarded")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn handlers_see_ongoing_work_token() {
        let (_, token, router) = pipeline();

        let response = router.clone().oneshot(get_request("/ongoing")).await.unwrap();
        assert_eq!(body_string(response).await, "false");

        token.cancel();
        let response = router.oneshot(get_request("/ongoing")).await.unwrap();
        assert_eq!(body_string(response).await, "true");
    }

    #[tokio::test]
    async fn handlers_cannot_cancel_shared_token() {
        let (_, token, router) = pipeline();

        let response = router.clone().oneshot(get_request("/abandon")).await.unwrap();
        assert_eq!(body_string(response).await, "abandoned");
        assert!(!token.is_cancelled());

        let response = router.oneshot(get_request("/ongoing")).await.unwrap();
        assert_eq!(body_string(response).await, "false");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (_, _, router) = pipeline();
        let response = router.oneshot(get_request("/missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

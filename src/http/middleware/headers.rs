//! Fixed response headers.

use axum::http::{header, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

/// Value of the `Server` header on every response.
pub const SERVER_HEADER: &str = concat!("api-server/", env!("CARGO_PKG_VERSION"));

/// Layer stamping the `Server` header, replacing any a handler set.
pub fn server_header() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(header::SERVER, HeaderValue::from_static(SERVER_HEADER))
}

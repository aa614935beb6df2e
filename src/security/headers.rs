//! Security response headers and CORS.
//!
//! # Responsibilities
//! - Add hardening headers to every response (optional)
//! - Build the CORS policy from the configured origin list
//!
//! # Design Decisions
//! - Headers are only set when the handler did not set them already
//! - An empty origin list allows any origin (wallet dApps run on many hosts)

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::SecurityConfig;

/// Headers added to each response when `security.enable_headers` is set.
pub const SECURITY_HEADERS: [(HeaderName, &str); 4] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::REFERRER_POLICY, "no-referrer"),
    (header::CACHE_CONTROL, "no-store"),
];

/// Wrap `router` with the hardening headers.
pub fn apply_security_headers<S>(router: Router<S>, config: &SecurityConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    if !config.enable_headers {
        return router;
    }
    SECURITY_HEADERS
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::if_not_present(
                name,
                HeaderValue::from_static(value),
            ))
        })
}

/// CORS policy for the API.
pub fn cors_layer(config: &SecurityConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if config.allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let mut parsed = Vec::new();
    for origin in &config.allowed_origins {
        match HeaderValue::from_str(origin) {
            Ok(value) => parsed.push(value),
            Err(e) => tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin"),
        }
    }
    cors.allow_origin(parsed)
}

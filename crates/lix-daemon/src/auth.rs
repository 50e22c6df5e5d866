//! Shared-key authentication middleware for non-bus HTTP requests.
//!
//! The pub/sub and persistent-queue surfaces trust their transport
//! (Redis/AMQP credentials already gate access); only the HTTP surface
//! needs a bearer-style check, and only when a key is configured.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lix_core::util::constant_time_eq;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub shared_key: Option<String>,
}

/// Paths that bypass authentication regardless of configuration.
const BYPASS_PATHS: &[&str] = &["/health", "/metrics"];

/// Checks `Authorization: Bearer <key>` against the configured shared key
/// in constant time. A `None` key disables auth entirely.
pub async fn auth_middleware(
    State(config): State<AuthConfig>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let Some(shared_key) = &config.shared_key else {
        return Ok(next.run(request).await);
    };

    let path = request.uri().path();
    if BYPASS_PATHS.iter().any(|p| path == *p) {
        return Ok(next.run(request).await);
    }

    let bearer_token = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if let Some(token) = bearer_token {
        if constant_time_eq(token, shared_key) {
            return Ok(next.run(request).await);
        }
    }

    warn!(path, "rejected request: missing or invalid shared key");

    Err((
        StatusCode::UNAUTHORIZED,
        [("WWW-Authenticate", "Bearer")],
        "Unauthorized: valid shared key required",
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_disabled_without_key() {
        let config = AuthConfig { shared_key: None };
        assert!(config.shared_key.is_none());
    }

    #[test]
    fn bypass_paths_include_health_and_metrics() {
        assert!(BYPASS_PATHS.contains(&"/health"));
        assert!(BYPASS_PATHS.contains(&"/metrics"));
    }
}

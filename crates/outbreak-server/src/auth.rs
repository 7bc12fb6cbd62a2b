use axum::body::Body;
use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;

/// Authentication configuration for the admin routes.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Bearer token for admin access. None = auth disabled.
    pub bearer_token: Option<String>,
}

/// True when `headers` carry `Authorization: Bearer <expected>`.
pub fn bearer_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}

/// Axum middleware that validates Bearer token authentication.
/// If no token is configured (`AuthConfig::bearer_token` is None), all
/// requests are allowed through (auth disabled).
pub async fn bearer_auth_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_config = request
        .extensions()
        .get::<AuthConfig>()
        .cloned()
        .unwrap_or_default();

    if let Some(ref expected) = auth_config.bearer_token
        && !bearer_matches(request.headers(), expected)
    {
        tracing::warn!(path = %request.uri().path(), "Rejected admin request");
        return Err(AppError::Unauthorized("Invalid or missing bearer token".to_string()));
    }

    Ok(next.run(request).await)
}

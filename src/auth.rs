//! Acting principal
//!
//! Identity is asserted by the fronting proxy through forwarded headers.
//! The middleware resolves it once per request and stores it in the request
//! extensions for handlers to pick up.

use crate::state::SharedState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

pub const FORWARDED_EMAIL: &str = "x-forwarded-email";
pub const FORWARDED_USER: &str = "x-forwarded-user";

/// Identity on whose behalf a request acts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

impl Principal {
    pub fn from_headers(headers: &HeaderMap, fallback: &str) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let name = header(FORWARDED_EMAIL)
            .or_else(|| header(FORWARDED_USER))
            .unwrap_or_else(|| fallback.to_string());
        Principal(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resolve the principal and insert it into request extensions
pub async fn principal_middleware(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = Principal::from_headers(request.headers(), &state.default_principal);
    request.extensions_mut().insert(principal);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_email_wins_over_user_and_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(Principal::from_headers(&headers, "unknown").as_str(), "unknown");

        headers.insert(FORWARDED_USER, HeaderValue::from_static("ana"));
        assert_eq!(Principal::from_headers(&headers, "unknown").as_str(), "ana");

        headers.insert(FORWARDED_EMAIL, HeaderValue::from_static("ana@example.com"));
        assert_eq!(
            Principal::from_headers(&headers, "unknown").as_str(),
            "ana@example.com"
        );
    }

    #[test]
    fn test_blank_header_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_EMAIL, HeaderValue::from_static("  "));
        headers.insert(FORWARDED_USER, HeaderValue::from_static("bob"));
        assert_eq!(Principal::from_headers(&headers, "unknown").as_str(), "bob");
    }
}

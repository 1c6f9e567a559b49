//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the `Authorization` header, validates it
//! with the configured [`JwtValidator`], and injects the [`Claims`] into
//! request extensions.

use crate::claims::Claims;
use crate::errors::AuthError;
use crate::validator::JwtValidator;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_validator: Arc<JwtValidator>,
}

/// Extract the Bearer token from the Authorization header.
///
/// The scheme is matched case-insensitively. The token is the text between
/// the first and second space.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers.get(header::AUTHORIZATION).ok_or_else(|| {
        tracing::debug!(target: "jwt_auth.middleware", "Missing Authorization header");
        AuthError::MissingHeader
    })?;

    let value = auth_header.to_str().map_err(|_| {
        tracing::debug!(target: "jwt_auth.middleware", "Authorization header is not ASCII");
        AuthError::NotBearer
    })?;

    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        tracing::debug!(target: "jwt_auth.middleware", "Invalid Authorization header format");
        return Err(AuthError::NotBearer);
    }

    // Only the text up to the next space is the token, so a doubled space
    // leaves it empty.
    let token = token.split(' ').next().unwrap_or("");
    if token.is_empty() {
        tracing::debug!(target: "jwt_auth.middleware", "Empty bearer token");
        return Err(AuthError::EmptyToken);
    }
    Ok(token)
}

/// Authentication middleware.
///
/// # Response
///
/// - Returns 401 Unauthorized if the token is missing or invalid
/// - Continues to next handler with `Claims` in extensions if the token is valid
#[instrument(skip_all, name = "jwt_auth.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let token = extract_bearer_token(req.headers())?;

    let claims = state.jwt_validator.validate(token).await?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extension trait for extracting claims from request.
pub trait ClaimsExt {
    /// Get the authenticated claims from request extensions.
    ///
    /// Returns `None` if auth middleware was not applied to this request.
    fn claims(&self) -> Option<&Claims>;
}

impl<B> ClaimsExt for axum::extract::Request<B> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            extract_bearer_token(&HeaderMap::new()).unwrap_err(),
            AuthError::MissingHeader
        );
    }

    #[test]
    fn test_bearer_token_extracted() {
        assert_eq!(extract_bearer_token(&headers_with("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert_eq!(extract_bearer_token(&headers_with("bearer abc")).unwrap(), "abc");
        assert_eq!(extract_bearer_token(&headers_with("BEARER abc")).unwrap(), "abc");
    }

    #[test]
    fn test_other_scheme_rejected() {
        assert_eq!(
            extract_bearer_token(&headers_with("Basic dXNlcjpwYXNz")).unwrap_err(),
            AuthError::NotBearer
        );
    }

    #[test]
    fn test_empty_token_rejected() {
        assert_eq!(
            extract_bearer_token(&headers_with("Bearer")).unwrap_err(),
            AuthError::EmptyToken
        );
        assert_eq!(
            extract_bearer_token(&headers_with("Bearer   ")).unwrap_err(),
            AuthError::EmptyToken
        );
    }

    #[test]
    fn test_doubled_space_leaves_token_empty() {
        assert_eq!(
            extract_bearer_token(&headers_with("Bearer  abc.def.ghi")).unwrap_err(),
            AuthError::EmptyToken
        );
    }

    #[test]
    fn test_text_after_token_ignored() {
        assert_eq!(
            extract_bearer_token(&headers_with("Bearer abc.def.ghi extra")).unwrap(),
            "abc.def.ghi"
        );
    }

    #[test]
    fn test_claims_ext() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        assert!(req.claims().is_none());

        req.extensions_mut().insert(Claims::default());
        assert!(req.claims().is_some());
    }
}

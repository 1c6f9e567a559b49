//! Authentication error types.
//!
//! Every variant maps to 401 Unauthorized with a JSON body and a
//! `WWW-Authenticate: Bearer` challenge. The reason a token was rejected is
//! logged server-side; clients only ever see "Invalid Token".

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Realm advertised in the `WWW-Authenticate` challenge.
pub const AUTH_REALM: &str = "api";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No `Authorization` header at all.
    #[error("Unauthorized")]
    MissingHeader,

    /// `Authorization` header with a scheme other than Bearer.
    #[error("Bearer token authorization expected")]
    NotBearer,

    /// `Authorization: Bearer` with nothing after it.
    #[error("No bearer token found")]
    EmptyToken,

    /// Malformed token, unknown key, bad signature, or failed claim check.
    #[error("Invalid Token")]
    InvalidToken,
}

impl AuthError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        StatusCode::UNAUTHORIZED.as_u16()
    }

    fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::MissingHeader | AuthError::NotBearer | AuthError::EmptyToken => {
                "UNAUTHORIZED"
            }
        }
    }

    fn challenge(&self) -> String {
        match self {
            AuthError::InvalidToken => {
                format!("Bearer realm=\"{AUTH_REALM}\", error=\"invalid_token\"")
            }
            AuthError::EmptyToken | AuthError::NotBearer => {
                format!("Bearer realm=\"{AUTH_REALM}\", error=\"invalid_request\"")
            }
            AuthError::MissingHeader => format!("Bearer realm=\"{AUTH_REALM}\""),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
            },
        };

        let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();

        if let Ok(header_value) = HeaderValue::from_str(&self.challenge()) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, header_value);
        }

        response
    }
}

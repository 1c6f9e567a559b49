//! Compact JWT decoding shared by the key resolver and the authentication layer.
//!
//! This module splits a compact token into its three segments and decodes the
//! header and payload. It performs NO signature or claim validation: the decoded
//! header is only used to pick a verification key, which then has to verify the
//! original token string.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE any decoding (DoS prevention)
//! - Error messages are intentionally generic to prevent information leakage
//! - Claim values are redacted in Debug output (only the issuer is shown)
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::decode_token;
//!
//! let decoded = decode_token(token)?;
//! let issuer = decoded.issuer();
//! let kid = decoded.header.kid.as_deref();
//! ```

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Typical tokens are well under 2KB even with RSA signatures. Anything larger
/// is rejected before base64 decoding allocates buffers for it.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Base64url engine that accepts segments with or without `=` padding.
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while decoding a compact token.
///
/// Both variants render the same message so callers cannot tell size
/// rejections from format rejections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token is not three base64url segments with JSON header and payload.
    #[error("The access token is invalid or expired")]
    MalformedToken,
}

// =============================================================================
// Decoded Token
// =============================================================================

/// JOSE header of a compact token.
///
/// Only `kid` and `alg` drive key resolution; every other member is kept in
/// `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Key ID the token claims to be signed with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Signing algorithm the token claims to use (e.g. `RS256`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Remaining header members (`typ`, `cty`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A compact token split into its decoded parts.
#[derive(Clone)]
pub struct DecodedToken {
    /// Decoded JOSE header.
    pub header: TokenHeader,

    /// Decoded claims object.
    pub payload: Map<String, Value>,

    /// Signature segment, still base64url encoded.
    pub signature: String,
}

impl DecodedToken {
    /// The `iss` claim, if present and a string.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.payload.get("iss").and_then(Value::as_str)
    }

    /// Shorthand for the header `kid`.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// Shorthand for the header `alg`.
    #[must_use]
    pub fn algorithm(&self) -> Option<&str> {
        self.header.alg.as_deref()
    }
}

impl fmt::Debug for DecodedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedToken")
            .field("header", &self.header)
            .field("iss", &self.issuer())
            .field("claims", &format_args!("[REDACTED; {}]", self.payload.len()))
            .field("signature", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Decode a compact JWT into header, payload and signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing
/// - This function does NOT validate the signature or any claim
/// - The header values must only be used to look up a key from a trusted source
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Not exactly three segments, a segment is not base64url,
///   or the header/payload is not a JSON object
pub fn decode_token(token: &str) -> Result<DecodedToken, TokenError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(TokenError::TokenTooLarge);
    }

    let parts: Vec<&str> = token.split('.').collect();
    let [header_part, payload_part, signature_part] = parts.as_slice() else {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(TokenError::MalformedToken);
    };

    let header: TokenHeader = decode_json_segment(header_part, "header")?;
    let payload: Map<String, Value> = decode_json_segment(payload_part, "payload")?;

    // The signature is opaque here, but it must at least be well-formed.
    SEGMENT_ENGINE.decode(signature_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT signature base64");
        TokenError::MalformedToken
    })?;

    Ok(DecodedToken {
        header,
        payload,
        signature: (*signature_part).to_string(),
    })
}

fn decode_json_segment<T: for<'de> Deserialize<'de>>(
    segment: &str,
    segment_name: &'static str,
) -> Result<T, TokenError> {
    let bytes = SEGMENT_ENGINE.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = segment_name, error = %e, "Failed to decode JWT segment base64");
        TokenError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = segment_name, error = %e, "Failed to parse JWT segment JSON");
        TokenError::MalformedToken
    })
}

// =============================================================================
// Tests
// =============================================================================

//! JWT validation against a configurable key source.
//!
//! # Security
//!
//! - The signing algorithm comes from the token header but must match the
//!   family of the selected key (jsonwebtoken enforces this), and the
//!   configured allow-list when one is set
//! - `exp` and `nbf` are enforced whenever they are present
//! - Every rejection surfaces as the same [`AuthError::InvalidToken`]; the
//!   reason is only logged

use crate::claims::Claims;
use crate::errors::AuthError;
use common::jwt::{decode_token, DecodedToken};
use common::secret::SecretString;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{decode, Algorithm, Validation};
use key_resolver::{KeyOrigin, ResolveKey, VerificationKey};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

/// Where verification keys come from.
#[derive(Clone)]
pub enum KeySource {
    /// A single shared HMAC secret.
    Secret(VerificationKey),
    /// A single public key.
    PublicKey(VerificationKey),
    /// Issuer-scoped resolution, typically a [`key_resolver::KeyResolver`].
    Resolver(Arc<dyn ResolveKey>),
}

impl KeySource {
    pub fn secret(secret: &SecretString) -> Self {
        KeySource::Secret(VerificationKey::from_secret(secret))
    }

    pub fn public_jwk(jwk: &Jwk) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(KeySource::PublicKey(VerificationKey::from_jwk(
            jwk,
            KeyOrigin::StaticPublicKey,
        )?))
    }

    pub fn resolver(resolver: Arc<dyn ResolveKey>) -> Self {
        KeySource::Resolver(resolver)
    }

    async fn key_for(&self, token: &DecodedToken) -> Result<VerificationKey, AuthError> {
        match self {
            KeySource::Secret(key) | KeySource::PublicKey(key) => Ok(key.clone()),
            KeySource::Resolver(resolver) => match resolver.resolve(token).await {
                Ok(Some(key)) => Ok(key),
                Ok(None) => {
                    tracing::debug!(
                        target: "jwt_auth.validator",
                        kid = ?token.key_id(),
                        "No verification key for token"
                    );
                    Err(AuthError::InvalidToken)
                }
                Err(e) => {
                    tracing::warn!(
                        target: "jwt_auth.validator",
                        kind = e.kind().as_str(),
                        error = %e,
                        "Key resolution failed"
                    );
                    Err(AuthError::InvalidToken)
                }
            },
        }
    }
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Secret(_) => f.write_str("KeySource::Secret([REDACTED])"),
            KeySource::PublicKey(key) => f.debug_tuple("KeySource::PublicKey").field(key).finish(),
            KeySource::Resolver(_) => f.write_str("KeySource::Resolver"),
        }
    }
}

/// Claim checks applied after the signature verifies.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Accepted `alg` values; empty accepts whatever the key supports.
    pub algorithms: Vec<Algorithm>,
    /// Accepted `aud` values; empty skips the audience check.
    pub audience: Vec<String>,
    /// Accepted `iss` values; empty skips the issuer check.
    pub issuers: Vec<String>,
    /// Clock skew tolerance for `exp` and `nbf`, in seconds.
    pub leeway: u64,
}

impl VerifyOptions {
    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        // exp/nbf are checked when present but never required
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = self.leeway;

        if self.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&self.audience);
        }
        if !self.issuers.is_empty() {
            validation.set_issuer(&self.issuers);
        }
        validation
    }
}

/// JWT validator.
#[derive(Debug, Clone)]
pub struct JwtValidator {
    source: KeySource,
    options: VerifyOptions,
}

impl JwtValidator {
    pub fn new(source: KeySource, options: VerifyOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    /// Validate a compact JWT and return its claims.
    #[instrument(skip_all, name = "jwt_auth.validate")]
    pub async fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let decoded = decode_token(token).map_err(|e| {
            tracing::debug!(target: "jwt_auth.validator", error = %e, "Token failed to decode");
            AuthError::InvalidToken
        })?;

        let alg = self.algorithm_for(&decoded)?;
        let key = self.source.key_for(&decoded).await?;

        let validation = self.options.validation(alg);
        let token_data = decode::<Claims>(token, key.decoding_key(), &validation).map_err(|e| {
            tracing::debug!(
                target: "jwt_auth.validator",
                error = %e,
                origin = ?key.origin(),
                "Token verification failed"
            );
            AuthError::InvalidToken
        })?;

        Ok(token_data.claims)
    }

    fn algorithm_for(&self, decoded: &DecodedToken) -> Result<Algorithm, AuthError> {
        let alg = decoded
            .algorithm()
            .and_then(|name| Algorithm::from_str(name).ok())
            .ok_or_else(|| {
                tracing::debug!(
                    target: "jwt_auth.validator",
                    alg = ?decoded.algorithm(),
                    "Missing or unsupported alg"
                );
                AuthError::InvalidToken
            })?;

        if !self.options.algorithms.is_empty() && !self.options.algorithms.contains(&alg) {
            tracing::debug!(target: "jwt_auth.validator", alg = ?alg, "Algorithm not allowed");
            return Err(AuthError::InvalidToken);
        }
        Ok(alg)
    }
}

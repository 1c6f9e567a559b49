//! Builder patterns for test tokens
//!
//! Provides a fluent API for JWT claims, signers for each fixture key type,
//! and raw encoders for tokens a real signer would never produce.

use crate::crypto_fixtures::{RsaTestKey, TestKeypair};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .issuer("https://issuer.example")
///     .for_user("alice")
///     .expires_in(3600)
///     .sign_eddsa(&keypair);
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with `sub`, `iat` and a one hour `exp`.
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!("test-subject"));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        Self { claims }
    }

    pub fn issuer(self, iss: &str) -> Self {
        self.claim("iss", json!(iss))
    }

    /// Set the subject (user/service)
    pub fn for_user(self, subject: &str) -> Self {
        self.claim("sub", json!(subject))
    }

    pub fn audience(self, aud: &str) -> Self {
        self.claim("aud", json!(aud))
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(self, seconds: i64) -> Self {
        self.claim("exp", json!((Utc::now() + Duration::seconds(seconds)).timestamp()))
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(self, seconds: i64) -> Self {
        self.claim("nbf", json!((Utc::now() + Duration::seconds(seconds)).timestamp()))
    }

    /// Drop the `exp` claim
    pub fn without_expiry(mut self) -> Self {
        self.claims.remove("exp");
        self
    }

    /// Set any claim
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    /// Sign with an Ed25519 fixture key (EdDSA, kid from the key)
    pub fn sign_eddsa(self, keypair: &TestKeypair) -> String {
        self.sign(Algorithm::EdDSA, Some(&keypair.kid), &keypair.encoding_key())
    }

    /// Sign with the RSA fixture key (RS256, kid from the key)
    pub fn sign_rs256(self, key: &RsaTestKey) -> String {
        self.sign(Algorithm::RS256, Some(&key.kid), &key.encoding_key())
    }

    /// Sign with a shared secret (HS256, no kid)
    pub fn sign_hs256(self, secret: &[u8]) -> String {
        self.sign(Algorithm::HS256, None, &EncodingKey::from_secret(secret))
    }

    /// Sign with an explicit algorithm and kid
    pub fn sign(self, alg: Algorithm, kid: Option<&str>, key: &EncodingKey) -> String {
        let mut header = Header::new(alg);
        header.typ = Some("JWT".to_string());
        header.kid = kid.map(str::to_string);

        encode(&header, &self.build(), key).expect("Failed to sign token")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a token from raw header and payload JSON with a dummy signature.
///
/// Useful for `alg: none`, mismatched `alg`, or other headers a real signer
/// would refuse.
pub fn encode_unsigned(header: &Value, payload: &Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(payload.to_string()),
        URL_SAFE_NO_PAD.encode(b"not-a-signature")
    )
}

/// Replace the signature of a compact token with another valid base64url one.
pub fn tamper_signature(token: &str) -> String {
    let (signed, _) = token.rsplit_once('.').expect("token has three segments");
    format!("{}.{}", signed, URL_SAFE_NO_PAD.encode([0u8; 64]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creates_valid_claims() {
        let claims = TestTokenBuilder::new()
            .issuer("https://issuer.example")
            .for_user("alice")
            .audience("api")
            .build();

        assert_eq!(claims["iss"], "https://issuer.example");
        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["aud"], "api");
        assert!(claims["exp"].as_i64().unwrap() > Utc::now().timestamp());
    }

    #[test]
    fn test_builder_default() {
        let claims = TestTokenBuilder::default().without_expiry().build();
        assert_eq!(claims["sub"], "test-subject");
        assert!(claims.get("exp").is_none());
    }

    #[test]
    fn test_signed_tokens_have_three_segments() {
        let keypair = TestKeypair::new(1, "k1");
        let rsa = RsaTestKey::new("r1");

        for token in [
            TestTokenBuilder::new().sign_eddsa(&keypair),
            TestTokenBuilder::new().sign_rs256(&rsa),
            TestTokenBuilder::new().sign_hs256(b"secret"),
        ] {
            assert_eq!(token.split('.').count(), 3);
        }
    }

    #[test]
    fn test_tamper_signature_keeps_header_and_payload() {
        let token = TestTokenBuilder::new().sign_hs256(b"secret");
        let tampered = tamper_signature(&token);

        assert_ne!(token, tampered);
        assert_eq!(
            token.rsplit_once('.').unwrap().0,
            tampered.rsplit_once('.').unwrap().0
        );
    }

    #[test]
    fn test_encode_unsigned() {
        let token = encode_unsigned(&json!({"alg": "none"}), &json!({"iss": "x"}));
        assert_eq!(token.split('.').count(), 3);
    }
}

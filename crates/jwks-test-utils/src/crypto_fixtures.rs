//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible Ed25519 keypairs and a fixed RSA key, each with its
//! public JWK. All fixtures are deterministic.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::EncodingKey;
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::{json, Value};

/// PKCS#1 PEM of the RSA test key.
pub const RSA_TEST_KEY_PEM: &str = include_str!("../fixtures/rsa_test_key.pem");

/// Base64url modulus of [`RSA_TEST_KEY_PEM`].
pub const RSA_TEST_KEY_N: &str = "sK8kIjYP5UsiNXSISVstY_KQAVsWY0uaebYtBT2-sW6ntBaSlFnXOP7MsAmCFiXdjqGPSQTAv8vrq50KyxZljyVbeCPqedC8PqRz1AfDvi3wLDLrE9GHPkR1RnggVrxxH7pbVY7Lub0j6R_Kn0t4ymlDuIRjrOxyX34VwbqyNMxveBl49wXqPrplXnn-TW3kQNX7KAuCKNl9wPXOyIve0qXE6F3KToKLqeqC9XDXcA1rCXHTpU9py2hBPUqvyr8PHTNWkpLxk0NdSzB53eXcMMc95QYJnRWoZ5mt-RMB7IF7fvHgWer-HbYBa4jCOe0ZonQHhCf1Lo2IiXztu9umWQ";

/// Base64url public exponent of [`RSA_TEST_KEY_PEM`].
pub const RSA_TEST_KEY_E: &str = "AQAB";

/// Ed25519 keypair for signing EdDSA test tokens.
///
/// The same seed always produces the same keypair.
///
/// # Example
/// ```rust,ignore
/// let keypair = TestKeypair::new(1, "test-key-01");
/// let jwks = serde_json::json!({ "keys": [keypair.jwk()] });
/// ```
#[derive(Debug, Clone)]
pub struct TestKeypair {
    pub kid: String,
    public_key_bytes: Vec<u8>,
    private_key_pkcs8: Vec<u8>,
}

impl TestKeypair {
    pub fn new(seed: u8, kid: &str) -> Self {
        // Create deterministic seed
        let mut seed_bytes = [0u8; 32];
        seed_bytes[0] = seed;
        for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
            *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .expect("Failed to create test keypair");

        Self {
            kid: kid.to_string(),
            public_key_bytes: key_pair.public_key().as_ref().to_vec(),
            private_key_pkcs8: build_pkcs8_from_seed(&seed_bytes),
        }
    }

    /// Key for `jsonwebtoken::encode`.
    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_ed_der(&self.private_key_pkcs8)
    }

    /// Public key as a JWK, as published in a key set.
    pub fn jwk(&self) -> Value {
        json!({
            "kty": "OKP",
            "kid": self.kid,
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(&self.public_key_bytes),
            "alg": "EdDSA",
            "use": "sig"
        })
    }
}

/// The fixed RSA key for signing RS256 test tokens.
#[derive(Debug, Clone)]
pub struct RsaTestKey {
    pub kid: String,
}

impl RsaTestKey {
    pub fn new(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
        }
    }

    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_rsa_pem(RSA_TEST_KEY_PEM.as_bytes()).expect("RSA test key must parse")
    }

    /// Public key as a JWK, as published in a key set.
    pub fn jwk(&self) -> Value {
        json!({
            "kty": "RSA",
            "kid": self.kid,
            "n": RSA_TEST_KEY_N,
            "e": RSA_TEST_KEY_E,
            "alg": "RS256",
            "use": "sig"
        })
    }
}

/// Build PKCS#8 v1 document from Ed25519 seed
///
/// This is a test-only utility. Production code must use ring::rand::SystemRandom.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = Vec::with_capacity(48);

    // Outer SEQUENCE, 46 bytes
    pkcs8.extend_from_slice(&[0x30, 0x2e]);

    // Version: INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);

    // AlgorithmIdentifier SEQUENCE with OID 1.3.101.112 (Ed25519)
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);

    // privateKey OCTET STRING wrapping the 32-byte seed OCTET STRING
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);

    pkcs8
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::signature::Ed25519KeyPair;

    #[test]
    fn test_keypair_is_deterministic() {
        let a = TestKeypair::new(1, "k1");
        let b = TestKeypair::new(1, "k1");
        assert_eq!(a.jwk(), b.jwk());
    }

    #[test]
    fn test_different_seeds_produce_different_keys() {
        let a = TestKeypair::new(1, "k1");
        let b = TestKeypair::new(2, "k1");
        assert_ne!(a.jwk()["x"], b.jwk()["x"]);
    }

    #[test]
    fn test_pkcs8_round_trips_through_ring() {
        let keypair = TestKeypair::new(7, "k7");
        let parsed = Ed25519KeyPair::from_pkcs8_maybe_unchecked(&keypair.private_key_pkcs8)
            .expect("PKCS#8 should parse");
        assert_eq!(parsed.public_key().as_ref(), keypair.public_key_bytes.as_slice());
    }

    #[test]
    fn test_rsa_jwk_shape() {
        let key = RsaTestKey::new("rsa-1");
        let jwk = key.jwk();
        assert_eq!(jwk["kid"], "rsa-1");
        assert_eq!(jwk["alg"], "RS256");
        let _ = key.encoding_key();
    }
}

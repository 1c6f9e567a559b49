//! Verification keys and the static secret table.
//!
//! A [`VerificationKey`] wraps an imported `jsonwebtoken::DecodingKey`. Keys
//! are immutable and cheap to clone, so the cache can hand them out by value.

use crate::config::ConfigError;
use common::secret::{secret_bytes, ExposeSecret, SecretSlice, SecretString};
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::DecodingKey;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Where a verification key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Configured shared secret (HMAC).
    StaticSecret,
    /// Configured public key.
    StaticPublicKey,
    /// Published in the issuer's key set.
    KeySet,
}

/// An imported key a token signature can be verified with.
#[derive(Clone)]
pub struct VerificationKey {
    key: Arc<DecodingKey>,
    origin: KeyOrigin,
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("key", &"[REDACTED]")
            .field("origin", &self.origin)
            .finish()
    }
}

impl VerificationKey {
    /// Key for a shared secret. The secret's UTF-8 bytes are the HMAC key.
    pub fn from_secret(secret: &SecretString) -> Self {
        Self::from_secret_bytes(&secret_bytes(secret))
    }

    /// Key for a shared secret given as raw bytes.
    pub fn from_secret_bytes(secret: &SecretSlice<u8>) -> Self {
        Self {
            key: Arc::new(DecodingKey::from_secret(secret.expose_secret())),
            origin: KeyOrigin::StaticSecret,
        }
    }

    /// Import a public JWK.
    pub fn from_jwk(jwk: &Jwk, origin: KeyOrigin) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self {
            key: Arc::new(DecodingKey::from_jwk(jwk)?),
            origin,
        })
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }

    pub fn origin(&self) -> KeyOrigin {
        self.origin
    }

    /// Whether both handles refer to the same imported key.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.key, &other.key)
    }
}

/// A statically configured issuer key.
#[derive(Clone, Debug)]
pub enum StaticKey {
    Secret(SecretString),
    /// Shared secret that is not valid UTF-8.
    SecretBytes(SecretSlice<u8>),
    PublicJwk(Box<Jwk>),
}

/// Per-issuer static keys, imported once at construction.
#[derive(Debug, Default)]
pub struct SecretTable {
    keys: HashMap<String, VerificationKey>,
}

impl SecretTable {
    /// Import every configured static key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidStaticKey` if a public JWK cannot be imported.
    pub fn from_static(entries: &HashMap<String, StaticKey>) -> Result<Self, ConfigError> {
        let mut keys = HashMap::with_capacity(entries.len());

        for (issuer, entry) in entries {
            let key = match entry {
                StaticKey::Secret(secret) => VerificationKey::from_secret(secret),
                StaticKey::SecretBytes(secret) => VerificationKey::from_secret_bytes(secret),
                StaticKey::PublicJwk(jwk) => VerificationKey::from_jwk(jwk, KeyOrigin::StaticPublicKey)
                    .map_err(|e| ConfigError::InvalidStaticKey {
                        issuer: issuer.clone(),
                        reason: e.to_string(),
                    })?,
            };
            keys.insert(issuer.clone(), key);
        }

        Ok(Self { keys })
    }

    pub fn get(&self, issuer: &str) -> Option<VerificationKey> {
        self.keys.get(issuer).cloned()
    }

    pub fn contains(&self, issuer: &str) -> bool {
        self.keys.contains_key(issuer)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

//! Secret types for protecting shared issuer secrets from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for statically configured HMAC
//! secrets. `SecretString` and `SecretSlice` redact themselves in `Debug`, so
//! configuration structs holding them can derive or hand-write `Debug` safely,
//! and they are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{secret_bytes, ExposeSecret, SecretString};
//!
//! let configured = SecretString::from("shared-hmac-secret");
//! let bytes = secret_bytes(&configured);
//!
//! assert_eq!(bytes.expose_secret(), b"shared-hmac-secret");
//! assert!(format!("{configured:?}").contains("REDACTED"));
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretSlice, SecretString};

/// Copy a string secret into a byte secret (UTF-8 encoding, as HMAC keys are
/// derived from configured strings).
#[must_use]
pub fn secret_bytes(secret: &SecretString) -> SecretSlice<u8> {
    SecretSlice::from(secret.expose_secret().as_bytes().to_vec())
}

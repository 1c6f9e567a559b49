//! Verified token claims.
//!
//! Claims are kept as the raw JSON payload so any issuer's custom members
//! reach handlers untouched. The `sub` member is redacted in Debug output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Payload of a token that passed signature and claim validation.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    /// The `iss` claim, if it is a string.
    pub fn issuer(&self) -> Option<&str> {
        self.get_str("iss")
    }

    /// The `sub` claim, if it is a string.
    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// Any claim by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }
}

/// Custom Debug implementation that redacts the `sub` field.
///
/// Only claim names are listed for the rest of the payload.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .0
            .keys()
            .map(String::as_str)
            .filter(|name| *name != "sub" && *name != "iss")
            .collect();
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.issuer())
            .field("other", &names)
            .finish()
    }
}

//! Gateway configuration.
//!
//! Wraps [`ResolverConfig`] with the HTTP-facing settings. Loaded from
//! environment variables; issuer secrets are redacted in Debug output.

use crate::validator::VerifyOptions;
use key_resolver::ResolverConfig;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Maximum allowed clock skew tolerance, in seconds.
pub const MAX_LEEWAY_SECONDS: u64 = 600;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Resolver(#[from] key_resolver::ConfigError),

    #[error("Invalid JWT_LEEWAY_SECONDS: {0}")]
    InvalidLeeway(String),

    #[error("Invalid LOG_FORMAT: {0} (expected 'json' or 'text')")]
    InvalidLogFormat(String),
}

/// Gateway configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Issuers and key sources.
    pub resolver: ResolverConfig,

    /// Accepted audiences; empty disables the audience check.
    pub audience: Vec<String>,

    /// Clock skew tolerance for `exp`/`nbf`.
    pub leeway_seconds: u64,

    pub log_format: LogFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("resolver", &self.resolver)
            .field("audience", &self.audience)
            .field("leeway_seconds", &self.leeway_seconds)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let resolver = ResolverConfig::from_vars(vars)?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let audience = vars
            .get("JWT_AUDIENCE")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let leeway_seconds = match vars.get("JWT_LEEWAY_SECONDS") {
            Some(raw) => {
                let value: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|e| ConfigError::InvalidLeeway(format!("{raw}: {e}")))?;
                if value > MAX_LEEWAY_SECONDS {
                    return Err(ConfigError::InvalidLeeway(format!(
                        "{value} exceeds maximum of {MAX_LEEWAY_SECONDS}"
                    )));
                }
                value
            }
            None => 0,
        };

        let log_format = match vars.get("LOG_FORMAT").map(|s| s.trim().to_ascii_lowercase()) {
            None => LogFormat::Text,
            Some(format) if format == "text" => LogFormat::Text,
            Some(format) if format == "json" => LogFormat::Json,
            Some(other) => return Err(ConfigError::InvalidLogFormat(other)),
        };

        Ok(Config {
            bind_address,
            resolver,
            audience,
            leeway_seconds,
            log_format,
        })
    }

    /// Claim checks for the validator.
    pub fn verify_options(&self) -> VerifyOptions {
        VerifyOptions {
            audience: self.audience.clone(),
            leeway: self.leeway_seconds,
            ..Default::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "JWT_ISSUERS".to_string(),
            "https://issuer.example".to_string(),
        )])
    }

    #[test]
    fn test_from_vars_with_defaults() {
        let config = Config::from_vars(&base_vars()).unwrap();

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert!(config.audience.is_empty());
        assert_eq!(config.leeway_seconds, 0);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.resolver.issuers, vec!["https://issuer.example"]);
    }

    #[test]
    fn test_from_vars_with_overrides() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("JWT_AUDIENCE".to_string(), "api, billing".to_string());
        vars.insert("JWT_LEEWAY_SECONDS".to_string(), "30".to_string());
        vars.insert("LOG_FORMAT".to_string(), "JSON".to_string());

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.audience, vec!["api", "billing"]);
        assert_eq!(config.leeway_seconds, 30);
        assert_eq!(config.log_format, LogFormat::Json);

        let options = config.verify_options();
        assert_eq!(options.leeway, 30);
        assert_eq!(options.audience, vec!["api", "billing"]);
    }

    #[test]
    fn test_missing_issuers_propagates() {
        let result = Config::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::Resolver(_))));
    }

    #[test]
    fn test_leeway_too_large() {
        let mut vars = base_vars();
        vars.insert("JWT_LEEWAY_SECONDS".to_string(), "601".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidLeeway(_))
        ));
    }

    #[test]
    fn test_leeway_not_a_number() {
        let mut vars = base_vars();
        vars.insert("JWT_LEEWAY_SECONDS".to_string(), "soon".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidLeeway(_))
        ));
    }

    #[test]
    fn test_unknown_log_format() {
        let mut vars = base_vars();
        vars.insert("LOG_FORMAT".to_string(), "xml".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_debug_redacts_issuer_secrets() {
        let mut vars = base_vars();
        vars.insert(
            "JWT_ISSUER_SECRETS".to_string(),
            "https://issuer.example=hunter2".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();
        let debug_str = format!("{config:?}");

        assert!(!debug_str.contains("hunter2"));
        assert!(debug_str.contains("0.0.0.0:8080"));
    }
}

//! Configuration loaded from `KEYLINE_*` environment variables.
//!
//! Loading is fail-fast: a missing required variable or an unparseable
//! value aborts startup with a clear message.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: &'static str, message: String },
}

/// Deployment environment. Controls log format and bootstrap seeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

impl AppEnvironment {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(ConfigError::InvalidValue {
                var: "KEYLINE_ENVIRONMENT",
                message: format!("expected development or production, got {other}"),
            }),
        }
    }

    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Which key store backend to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStoreBackend {
    /// Keys live in process memory and die with it.
    Memory,
    /// Keys persist as JSON files under a directory.
    Directory(PathBuf),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address to bind.
    pub listen_addr: SocketAddr,
    /// Public base URL of this server, no trailing slash.
    pub external_url: String,
    /// Base URL of the login frontend, no trailing slash.
    pub frontend_url: String,
    pub environment: AppEnvironment,
    pub key_store: KeyStoreBackend,
    /// Log filter directive, e.g. `info,keyline=debug`.
    pub log_filter: String,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let listen_addr = lookup("KEYLINE_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                var: "KEYLINE_LISTEN_ADDR",
                message: format!("{e}"),
            })?;

        let external_url = require(&lookup, "KEYLINE_EXTERNAL_URL")?;
        let frontend_url = require(&lookup, "KEYLINE_FRONTEND_URL")?;
        for (var, value) in [
            ("KEYLINE_EXTERNAL_URL", &external_url),
            ("KEYLINE_FRONTEND_URL", &frontend_url),
        ] {
            if value.ends_with('/') {
                return Err(ConfigError::InvalidValue {
                    var,
                    message: "must not end with a slash".to_string(),
                });
            }
        }

        let environment = match lookup("KEYLINE_ENVIRONMENT") {
            Some(value) => AppEnvironment::parse(&value)?,
            None => AppEnvironment::Development,
        };

        let key_store = match lookup("KEYLINE_KEY_STORE").as_deref() {
            None | Some("memory") => KeyStoreBackend::Memory,
            Some("directory") => {
                let dir = lookup("KEYLINE_KEY_STORE_DIR")
                    .ok_or(ConfigError::MissingVar("KEYLINE_KEY_STORE_DIR"))?;
                KeyStoreBackend::Directory(PathBuf::from(dir))
            }
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    var: "KEYLINE_KEY_STORE",
                    message: format!("expected memory or directory, got {other}"),
                })
            }
        };

        let log_filter =
            lookup("KEYLINE_LOG_LEVEL").unwrap_or_else(|| "info,keyline=debug".to_string());

        Ok(Self {
            listen_addr,
            external_url,
            frontend_url,
            environment,
            key_store,
            log_filter,
        })
    }
}

fn require(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<String, ConfigError> {
    lookup(var)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingVar(var))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, String> {
        HashMap::from([
            ("KEYLINE_EXTERNAL_URL", "https://idp.example.com".to_string()),
            (
                "KEYLINE_FRONTEND_URL",
                "https://login.example.com".to_string(),
            ),
        ])
    }

    fn load(vars: HashMap<&'static str, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn minimal_configuration_uses_defaults() {
        let config = load(base_vars()).unwrap();
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.key_store, KeyStoreBackend::Memory);
    }

    #[test]
    fn missing_external_url_is_fatal() {
        let mut vars = base_vars();
        vars.remove("KEYLINE_EXTERNAL_URL");
        assert!(matches!(
            load(vars),
            Err(ConfigError::MissingVar("KEYLINE_EXTERNAL_URL"))
        ));
    }

    #[test]
    fn trailing_slash_in_urls_is_rejected() {
        let mut vars = base_vars();
        vars.insert("KEYLINE_EXTERNAL_URL", "https://idp.example.com/".to_string());
        assert!(load(vars).is_err());
    }

    #[test]
    fn directory_backend_requires_a_path() {
        let mut vars = base_vars();
        vars.insert("KEYLINE_KEY_STORE", "directory".to_string());
        assert!(matches!(
            load(vars.clone()),
            Err(ConfigError::MissingVar("KEYLINE_KEY_STORE_DIR"))
        ));

        vars.insert("KEYLINE_KEY_STORE_DIR", "/var/lib/keyline/keys".to_string());
        let config = load(vars).unwrap();
        assert_eq!(
            config.key_store,
            KeyStoreBackend::Directory(PathBuf::from("/var/lib/keyline/keys"))
        );
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let mut vars = base_vars();
        vars.insert("KEYLINE_ENVIRONMENT", "staging".to_string());
        assert!(load(vars).is_err());
    }

    #[test]
    fn production_is_recognized() {
        let mut vars = base_vars();
        vars.insert("KEYLINE_ENVIRONMENT", "production".to_string());
        let config = load(vars).unwrap();
        assert!(config.environment.is_production());
    }
}

// ABOUTME: Environment-based server configuration with validation and defaults
// ABOUTME: Loads every deployment knob from env vars, optionally seeded by a .env file
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::env;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {reason}")]
    InvalidVar { var: &'static str, reason: String },
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(ConfigError::InvalidVar {
                var: "ENVIRONMENT",
                reason: format!("expected development or production, got {other}"),
            }),
        }
    }
}

/// Log level as configured via `LOG_LEVEL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// The tracing filter directive equivalent
    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            other => Err(ConfigError::InvalidVar {
                var: "LOG_LEVEL",
                reason: format!("expected DEBUG|INFO|WARNING|ERROR, got {other}"),
            }),
        }
    }
}

/// Server configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port
    pub port: u16,
    /// Trusted proxy IPs/CIDRs; may be empty
    pub trusted_proxies: Vec<String>,
    /// Frontend base URL used for login redirects
    pub frontend_url: String,
    /// bcrypt cost factor (4..=31)
    pub salt_rounds: u32,
    /// Cookie domain
    pub domain: String,
    /// Deployment environment
    pub environment: Environment,
    /// Name of the session-token cookie
    pub session_cookie_name: String,
    /// Postgres DSN
    pub database_url: String,
    /// Directory with sqlx migration files
    pub migrations_path: String,
    /// Cache server URL (Redis protocol)
    pub valkey_url: String,
    /// Optional cache credentials
    pub valkey_username: Option<String>,
    pub valkey_password: Option<String>,
    /// Optional CLIENT SETNAME value
    pub valkey_client_name: Option<String>,
    /// Issuer / external base URL; empty means derive from the port
    pub base_url: String,
    /// Session JWT lifetime in hours
    pub session_token_expiry_hours: i64,
    /// Ed25519 seed; exactly 32 bytes
    pub jwt_secret: Vec<u8>,
    /// Log verbosity
    pub log_level: LogLevel,
    /// Whether a failed PKCE check consumes the authorization code.
    /// RFC 7636 does not require deletion, so this defaults to off.
    pub delete_code_on_pkce_failure: bool,
}

impl ServerConfig {
    /// Load and validate the configuration from environment variables.
    /// A `.env` file in the working directory is loaded first when present.
    ///
    /// # Errors
    /// Returns an error when a required variable is missing or a value fails
    /// validation
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; the environment is used as-is.
        let _ = dotenvy::dotenv();

        let port = env_parsed("PORT", 8080_u16, |p| *p > 0)?;
        let log_level = match env::var("LOG_LEVEL") {
            Ok(value) => value.parse()?,
            Err(_) => LogLevel::Info,
        };

        let frontend_url = required("FRONTEND_URL")?;
        Url::parse(&frontend_url).map_err(|e| ConfigError::InvalidVar {
            var: "FRONTEND_URL",
            reason: e.to_string(),
        })?;

        let jwt_secret = required("JWT_SECRET")?.into_bytes();
        if jwt_secret.len() != 32 {
            return Err(ConfigError::InvalidVar {
                var: "JWT_SECRET",
                reason: format!("must be exactly 32 bytes, got {}", jwt_secret.len()),
            });
        }

        let session_token_expiry_hours =
            env_parsed("JWT_SESSION_TOKEN_EXPIRY_HOURS", 24_i64, |h| *h > 0)?;

        let environment = match env::var("ENVIRONMENT") {
            Ok(value) => value.parse()?,
            Err(_) => Environment::Development,
        };

        Ok(Self {
            port,
            trusted_proxies: trusted_proxies_from_env()?,
            frontend_url,
            salt_rounds: env_parsed("SALT_ROUNDS", 10_u32, |r| (4..=31).contains(r))?,
            domain: env_or("DOMAIN", "localhost"),
            environment,
            session_cookie_name: env_or("SESSION_COOKIE_NAME", "session_token"),
            database_url: required("DATABASE_URL")?,
            migrations_path: env_or("MIGRATIONS_PATH", "migrations"),
            valkey_url: required("VALKEY_URL")?,
            valkey_username: env::var("VALKEY_USERNAME").ok().filter(|v| !v.is_empty()),
            valkey_password: env::var("VALKEY_PASSWORD").ok().filter(|v| !v.is_empty()),
            valkey_client_name: env::var("VALKEY_CLIENT_NAME").ok().filter(|v| !v.is_empty()),
            base_url: env::var("BASE_URL")
                .or_else(|_| env::var("JWT_ISSUER"))
                .unwrap_or_default(),
            session_token_expiry_hours,
            jwt_secret,
            log_level,
            delete_code_on_pkce_failure: env_or("DELETE_CODE_ON_PKCE_FAILURE", "false") == "true",
        })
    }

    /// The issuer URL, falling back to `http://localhost:<port>` when no base
    /// URL is configured
    #[must_use]
    pub fn issuer(&self) -> String {
        if self.base_url.is_empty() {
            warn!("BASE_URL not configured, using default issuer");
            format!("http://localhost:{}", self.port)
        } else {
            self.base_url.trim_end_matches('/').to_owned()
        }
    }

    /// Session-token lifetime in whole seconds
    #[must_use]
    pub const fn session_token_expiry_secs(&self) -> i64 {
        self.session_token_expiry_hours * 3600
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::MissingVar(var))
}

fn env_or(var: &str, fallback: &str) -> String {
    env::var(var).unwrap_or_else(|_| fallback.to_owned())
}

fn env_parsed<T>(var: &'static str, fallback: T, valid: impl Fn(&T) -> bool) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Ok(raw) = env::var(var) else {
        return Ok(fallback);
    };
    let value = raw.parse::<T>().map_err(|e| ConfigError::InvalidVar {
        var,
        reason: e.to_string(),
    })?;
    if valid(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidVar {
            var,
            reason: format!("value {raw} is out of range"),
        })
    }
}

/// Parse `TRUSTED_PROXIES` as a comma-separated list of IPs or CIDR blocks
fn trusted_proxies_from_env() -> Result<Vec<String>, ConfigError> {
    let raw = env::var("TRUSTED_PROXIES").unwrap_or_default();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let mut proxies = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if !is_ip_or_cidr(part) {
            return Err(ConfigError::InvalidVar {
                var: "TRUSTED_PROXIES",
                reason: format!("{part} is not a valid IP or CIDR"),
            });
        }
        proxies.push(part.to_owned());
    }
    Ok(proxies)
}

fn is_ip_or_cidr(value: &str) -> bool {
    if value.parse::<IpAddr>().is_ok() {
        return true;
    }
    match value.split_once('/') {
        Some((addr, prefix)) => {
            addr.parse::<IpAddr>().is_ok() && prefix.parse::<u8>().map_or(false, |p| p <= 128)
        }
        None => false,
    }
}

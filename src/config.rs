//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables, optionally seeded
//! from a `.env` file. Everything except the signing secret has a default
//! suitable for development.
//!
//! # Security Configuration
//!
//! - `INTERNAL_JWT_SECRET` (required): shared HMAC key used by calling
//!   backends to sign inter-service tokens. Must be at least 32 bytes.
//! - `JWT_REQUIRED_ISSUER` / `JWT_REQUIRED_ROLE`: the only accepted caller
//!   identity (default `civicfix-backend` / `INTERNAL_SERVICE`)
//! - `AUTH_BYPASS_PATHS`: paths reachable without a token (default `/health,/ready`)
//!
//! # AI Analyzer
//!
//! - `AI_API_BASE_URL`, `AI_MODEL`, `AI_API_KEY`, `AI_REQUEST_TIMEOUT_SECS`
//! - `CIRCUIT_BREAKER_*`: fail-fast behaviour when the analyzer is down
//!
//! The secret and policy are read once here and never change for the
//! lifetime of the process. Rotating the key requires a restart.

use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Issuer every inter-service token must carry.
pub const DEFAULT_REQUIRED_ISSUER: &str = "civicfix-backend";

/// Role every inter-service token must carry.
pub const DEFAULT_REQUIRED_ROLE: &str = "INTERNAL_SERVICE";

/// Minimum HMAC key length in bytes (256 bits).
pub const MIN_SECRET_LENGTH: usize = 32;

/// Application configuration loaded from environment variables.
///
/// `Debug` is implemented by hand so the signing secret and API key never
/// end up in logs.
#[derive(Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 5000)
    pub port: u16,

    /// Maximum request body size in bytes (default: 10MB)
    pub max_request_body_size: usize,

    /// Allowed CORS origins; `*` allows any
    pub cors_allowed_origins: Vec<String>,

    // =========================================================================
    // Inter-service Authentication
    // =========================================================================
    /// Shared HMAC secret for token verification
    pub jwt_secret: String,

    /// Required `iss` claim
    pub required_issuer: String,

    /// Required `role` claim
    pub required_role: String,

    /// Paths that bypass the auth gate (exact, case-sensitive match)
    pub auth_bypass_paths: Vec<String>,

    // =========================================================================
    // AI Analyzer Configuration
    // =========================================================================
    /// Base URL of the Gemini-compatible API
    pub ai_api_base_url: String,

    /// Model name used in the `generateContent` path
    pub ai_model: String,

    /// API key sent as `x-goog-api-key` (optional, e.g. behind a credential proxy)
    pub ai_api_key: Option<String>,

    /// Timeout for a single analyzer call (default: 30 seconds)
    pub ai_request_timeout: Duration,

    // =========================================================================
    // Circuit Breaker Configuration
    // =========================================================================
    /// Consecutive analyzer failures before the circuit opens (default: 5)
    pub circuit_breaker_failure_threshold: u32,

    /// Consecutive half-open successes before the circuit closes (default: 2)
    pub circuit_breaker_success_threshold: u32,

    /// How long the circuit stays open (default: 30s)
    pub circuit_breaker_open_duration: Duration,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` when `INTERNAL_JWT_SECRET` is missing
    /// or any value fails to parse or validate.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let jwt_secret = env::var("INTERNAL_JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppError::ConfigError("INTERNAL_JWT_SECRET is required".to_string())
            })?;

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 5000)?,
            max_request_body_size: Self::parse_env("MAX_REQUEST_BODY_SIZE", 10 * 1024 * 1024)?,
            cors_allowed_origins: Self::parse_list("CORS_ALLOWED_ORIGINS", "*"),

            jwt_secret,
            required_issuer: env::var("JWT_REQUIRED_ISSUER")
                .unwrap_or_else(|_| DEFAULT_REQUIRED_ISSUER.to_string()),
            required_role: env::var("JWT_REQUIRED_ROLE")
                .unwrap_or_else(|_| DEFAULT_REQUIRED_ROLE.to_string()),
            auth_bypass_paths: Self::parse_list("AUTH_BYPASS_PATHS", "/health,/ready")
                .into_iter()
                .filter(|p| p.starts_with('/'))
                .collect(),

            ai_api_base_url: env::var("AI_API_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            ai_model: env::var("AI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            ai_api_key: env::var("AI_API_KEY").ok().filter(|k| !k.is_empty()),
            ai_request_timeout: Duration::from_secs(Self::parse_env("AI_REQUEST_TIMEOUT_SECS", 30)?),

            circuit_breaker_failure_threshold: Self::parse_env(
                "CIRCUIT_BREAKER_FAILURE_THRESHOLD",
                5,
            )?,
            circuit_breaker_success_threshold: Self::parse_env(
                "CIRCUIT_BREAKER_SUCCESS_THRESHOLD",
                2,
            )?,
            circuit_breaker_open_duration: Duration::from_secs(Self::parse_env(
                "CIRCUIT_BREAKER_OPEN_DURATION_SECS",
                30,
            )?),

            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.jwt_secret.len() < MIN_SECRET_LENGTH {
            return Err(AppError::ConfigError(format!(
                "INTERNAL_JWT_SECRET must be at least {MIN_SECRET_LENGTH} bytes (got {})",
                self.jwt_secret.len()
            )));
        }

        if self.required_issuer.is_empty() || self.required_role.is_empty() {
            return Err(AppError::ConfigError(
                "JWT_REQUIRED_ISSUER and JWT_REQUIRED_ROLE must not be empty".to_string(),
            ));
        }

        if !self.ai_api_base_url.starts_with("http://")
            && !self.ai_api_base_url.starts_with("https://")
        {
            return Err(AppError::ConfigError(format!(
                "AI_API_BASE_URL must be an http(s) URL (got {})",
                self.ai_api_base_url
            )));
        }

        if self.ai_request_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "AI_REQUEST_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.circuit_breaker_failure_threshold == 0
            || self.circuit_breaker_success_threshold == 0
        {
            return Err(AppError::ConfigError(
                "CIRCUIT_BREAKER thresholds must be greater than 0".to_string(),
            ));
        }

        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address, or `None` when disabled.
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        self.metrics_enabled()
            .then(|| std::net::SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse a comma-separated list, dropping blank entries.
    fn parse_list(name: &str, default: &str) -> Vec<String> {
        split_list(&env::var(name).unwrap_or_else(|_| default.to_string()))
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_request_body_size", &self.max_request_body_size)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("jwt_secret", &"<redacted>")
            .field("required_issuer", &self.required_issuer)
            .field("required_role", &self.required_role)
            .field("auth_bypass_paths", &self.auth_bypass_paths)
            .field("ai_api_base_url", &self.ai_api_base_url)
            .field("ai_model", &self.ai_model)
            .field("ai_api_key", &self.ai_api_key.as_ref().map(|_| "<redacted>"))
            .field("ai_request_timeout", &self.ai_request_timeout)
            .field("log_level", &self.log_level)
            .field("metrics_port", &self.metrics_port)
            .finish_non_exhaustive()
    }
}

/// Default configuration for testing and development.
///
/// The secret is a fixed development value. Production deployments must use
/// `Config::from_env()`.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_request_body_size: 10 * 1024 * 1024, // 10MB
            cors_allowed_origins: vec!["*".to_string()],
            jwt_secret: "dev-only-internal-secret-change-me-0123456789".to_string(),
            required_issuer: DEFAULT_REQUIRED_ISSUER.to_string(),
            required_role: DEFAULT_REQUIRED_ROLE.to_string(),
            auth_bypass_paths: vec!["/health".to_string(), "/ready".to_string()],
            ai_api_base_url: "https://generativelanguage.googleapis.com".to_string(),
            ai_model: "gemini-2.0-flash".to_string(),
            ai_api_key: None,
            ai_request_timeout: Duration::from_secs(30),
            circuit_breaker_failure_threshold: 5,
            circuit_breaker_success_threshold: 2,
            circuit_breaker_open_duration: Duration::from_secs(30),
            log_level: "info".to_string(),
            metrics_port: 9090,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.port, 5000);
        assert_eq!(config.required_issuer, "civicfix-backend");
        assert_eq!(config.required_role, "INTERNAL_SERVICE");
        assert_eq!(config.max_request_body_size, 10 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_addr_format() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };

        assert_eq!(config.server_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_validate_short_secret() {
        let config = Config {
            jwt_secret: "too-short".to_string(),
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("INTERNAL_JWT_SECRET"));
    }

    #[test]
    fn test_validate_empty_policy() {
        let config = Config {
            required_role: String::new(),
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_base_url_scheme() {
        let config = Config {
            ai_api_base_url: "ftp://example.com".to_string(),
            ..Config::default()
        };

        assert!(config.validate().unwrap_err().to_string().contains("AI_API_BASE_URL"));
    }

    #[test]
    fn test_validate_zero_thresholds() {
        let config = Config {
            circuit_breaker_failure_threshold: 0,
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_addr_disabled() {
        let config = Config {
            metrics_port: 0,
            ..Config::default()
        };

        assert!(config.metrics_addr().is_none());
        assert!(Config::default().metrics_addr().is_some());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config {
            ai_api_key: Some("super-secret-api-key".to_string()),
            ..Config::default()
        };

        let debug = format!("{config:?}");
        assert!(!debug.contains(&config.jwt_secret));
        assert!(!debug.contains("super-secret-api-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_split_list_trims_and_drops_blanks() {
        assert_eq!(
            split_list(" /health , ,/ready,"),
            vec!["/health".to_string(), "/ready".to_string()]
        );
    }
}

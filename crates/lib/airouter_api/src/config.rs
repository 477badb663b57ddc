//! API server configuration.

use std::time::Duration;

use airouter_core::providers::config::ProviderConfig;
use axum::http::HeaderValue;
use thiserror::Error;

/// Default bound on a single generation: long-running, but not unbounded.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Configuration errors raised at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("{0} environment variable is invalid: {1}")]
    Invalid(&'static str, String),
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "0.0.0.0:8080").
    pub bind_addr: String,
    /// PostgreSQL connection URL; the in-memory identity store is used when unset.
    pub database_url: Option<String>,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Front-end origin allowed by CORS, without a trailing slash; any
    /// origin is allowed when unset.
    pub client_url: Option<HeaderValue>,
    /// Upper bound on one generation stream.
    pub generation_timeout: Duration,
    /// Upstream provider keys and endpoints.
    pub providers: ProviderConfig,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                  | Default         |
    /// |---------------------------|-----------------|
    /// | `BIND_ADDR`               | `0.0.0.0:8080`  |
    /// | `DATABASE_URL`            | unset (memory)  |
    /// | `JWT_SECRET`              | required        |
    /// | `CLIENT_URL`              | unset           |
    /// | `GENERATION_TIMEOUT_SECS` | `300`           |
    ///
    /// Provider variables are documented on [`ProviderConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let generation_timeout = match std::env::var("GENERATION_TIMEOUT_SECS") {
            Ok(raw) => parse_timeout(&raw)?,
            Err(_) => DEFAULT_GENERATION_TIMEOUT,
        };

        let client_url = match std::env::var("CLIENT_URL") {
            Ok(raw) => parse_client_url(&raw)?,
            Err(_) => None,
        };

        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            jwt_secret,
            client_url,
            generation_timeout,
            providers: ProviderConfig::from_env(),
        })
    }
}

/// Whole seconds, at least one.
fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    let secs = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::Invalid("GENERATION_TIMEOUT_SECS", e.to_string()))?;
    if secs == 0 {
        return Err(ConfigError::Invalid(
            "GENERATION_TIMEOUT_SECS",
            "must be at least 1".into(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// An `http(s)://` origin usable as a CORS header value. Empty means unset.
fn parse_client_url(raw: &str) -> Result<Option<HeaderValue>, ConfigError> {
    let origin = raw.trim().trim_end_matches('/');
    if origin.is_empty() {
        return Ok(None);
    }
    let invalid = |why: &str| ConfigError::Invalid("CLIENT_URL", format!("{why}: {raw:?}"));
    let host = origin
        .strip_prefix("https://")
        .or_else(|| origin.strip_prefix("http://"))
        .ok_or_else(|| invalid("expected an http:// or https:// origin"))?;
    if host.is_empty() || host.contains('/') {
        return Err(invalid("expected scheme and host only"));
    }
    HeaderValue::from_str(origin)
        .map(Some)
        .map_err(|_| invalid("not a valid header value"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_must_be_positive() {
        assert_eq!(parse_timeout("30").unwrap(), Duration::from_secs(30));
        assert!(matches!(
            parse_timeout("0"),
            Err(ConfigError::Invalid("GENERATION_TIMEOUT_SECS", _))
        ));
        assert!(parse_timeout("-5").is_err());
        assert!(parse_timeout("soon").is_err());
    }

    #[test]
    fn client_url_is_normalised() {
        assert_eq!(
            parse_client_url("https://app.example.com/").unwrap(),
            Some(HeaderValue::from_static("https://app.example.com"))
        );
        assert_eq!(
            parse_client_url("http://localhost:5173").unwrap(),
            Some(HeaderValue::from_static("http://localhost:5173"))
        );
        assert_eq!(parse_client_url("").unwrap(), None);
    }

    #[test]
    fn malformed_client_url_is_rejected() {
        for raw in [
            "app.example.com",
            "https://",
            "https://app.example.com/login",
            "https://app\n.example.com",
            "https://bad\u{7f}host",
        ] {
            assert!(
                matches!(parse_client_url(raw), Err(ConfigError::Invalid("CLIENT_URL", _))),
                "{raw:?} accepted"
            );
        }
    }
}

//! Provider credentials and endpoints.

use std::env;

pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEEPSEEK_DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// API key and base URL for one upstream platform.
#[derive(Clone, Default)]
pub struct Endpoint {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Resolved configuration for all upstream platforms.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub openai: Endpoint,
    pub deepseek: Endpoint,
    pub gemini: Endpoint,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            openai: Endpoint {
                api_key: None,
                base_url: OPENAI_DEFAULT_BASE_URL.into(),
            },
            deepseek: Endpoint {
                api_key: None,
                base_url: DEEPSEEK_DEFAULT_BASE_URL.into(),
            },
            gemini: Endpoint {
                api_key: None,
                base_url: GEMINI_DEFAULT_BASE_URL.into(),
            },
        }
    }
}

impl ProviderConfig {
    /// Reads provider settings from environment variables.
    ///
    /// | Variable            | Default                                      |
    /// |---------------------|----------------------------------------------|
    /// | `OPENAI_API_KEY`    | unset                                        |
    /// | `OPENAI_BASE_URL`   | `https://api.openai.com/v1`                  |
    /// | `DEEPSEEK_API_KEY`  | unset                                        |
    /// | `DEEPSEEK_BASE_URL` | `https://api.deepseek.com/v1`                |
    /// | `GEMINI_API_KEY`    | unset                                        |
    /// | `GEMINI_BASE_URL`   | `https://generativelanguage.googleapis.com`  |
    ///
    /// A platform without a key stays routable; its generations fail in-band.
    pub fn from_env() -> Self {
        Self {
            openai: endpoint_from_env("OPENAI_API_KEY", "OPENAI_BASE_URL", OPENAI_DEFAULT_BASE_URL),
            deepseek: endpoint_from_env(
                "DEEPSEEK_API_KEY",
                "DEEPSEEK_BASE_URL",
                DEEPSEEK_DEFAULT_BASE_URL,
            ),
            gemini: endpoint_from_env("GEMINI_API_KEY", "GEMINI_BASE_URL", GEMINI_DEFAULT_BASE_URL),
        }
    }
}

fn endpoint_from_env(key_var: &str, url_var: &str, default_url: &str) -> Endpoint {
    Endpoint {
        api_key: env::var(key_var).ok().filter(|k| !k.is_empty()),
        base_url: env::var(url_var)
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| default_url.to_string())
            .trim_end_matches('/')
            .to_string(),
    }
}

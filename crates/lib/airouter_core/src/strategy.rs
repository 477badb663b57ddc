//! Platform routing: maps a caller-supplied platform identifier to the
//! adapter that serves it.
//!
//! The mapping is built once at startup and never mutated. Resolution is
//! synchronous so an unknown platform can still be rejected with an ordinary
//! error status before any response bytes are written.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::providers::config::ProviderConfig;
use crate::providers::deepseek::DeepSeekAdapter;
use crate::providers::gemini::GeminiAdapter;
use crate::providers::openai::OpenAiAdapter;
use crate::providers::{FragmentStream, Platform, ProviderAdapter, ProviderError, failed};

/// Fixed platform → adapter table.
#[derive(Clone, Default)]
pub struct StrategyRouter {
    adapters: HashMap<Platform, Arc<dyn ProviderAdapter>>,
}

impl StrategyRouter {
    /// An empty router; every platform is unsupported until registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Router serving all three upstream platforms.
    pub fn from_config(client: Client, config: &ProviderConfig) -> Self {
        Self::new()
            .with_adapter(Arc::new(GeminiAdapter::new(
                client.clone(),
                config.gemini.clone(),
            )))
            .with_adapter(Arc::new(OpenAiAdapter::new(
                client.clone(),
                config.openai.clone(),
            )))
            .with_adapter(Arc::new(DeepSeekAdapter::new(client, config.deepseek.clone())))
    }

    /// Register an adapter under the platform it reports.
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.platform(), adapter);
        self
    }

    /// Platforms with a registered adapter.
    pub fn platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.adapters.contains_key(p))
            .collect()
    }

    /// Resolve a platform identifier without contacting any upstream.
    pub fn resolve(&self, platform: &str) -> Result<Route, ProviderError> {
        let key: Platform = platform.parse()?;
        let adapter = self
            .adapters
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnsupportedPlatform(platform.to_string()))?;
        Ok(Route {
            platform: key,
            adapter,
        })
    }

    /// Resolve and start a generation in one step.
    pub fn dispatch(
        &self,
        platform: &str,
        model: &str,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, ProviderError> {
        Ok(self.resolve(platform)?.stream(model, prompt, cancel))
    }
}

/// A resolved platform, ready to start generations.
#[derive(Clone)]
pub struct Route {
    platform: Platform,
    adapter: Arc<dyn ProviderAdapter>,
}

impl Route {
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Start a generation on this route.
    ///
    /// A blank prompt fails before anything is sent upstream.
    pub fn stream(&self, model: &str, prompt: &str, cancel: CancellationToken) -> FragmentStream {
        if prompt.trim().is_empty() {
            return failed(ProviderError::EmptyPrompt);
        }
        self.adapter.stream(model, prompt, cancel)
    }
}

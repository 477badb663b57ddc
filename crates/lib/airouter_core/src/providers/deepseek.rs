//! DeepSeek provider.
//!
//! DeepSeek serves an OpenAI-compatible chat completions API, so this adapter
//! only differs from [`super::openai::OpenAiAdapter`] in the endpoint it calls.

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use super::config::Endpoint;
use super::openai::ChatCompletions;
use super::{FragmentStream, Platform, ProviderAdapter};

/// DeepSeek platform adapter.
#[derive(Debug, Clone)]
pub struct DeepSeekAdapter {
    inner: ChatCompletions,
}

impl DeepSeekAdapter {
    pub fn new(client: Client, endpoint: Endpoint) -> Self {
        Self {
            inner: ChatCompletions::new(Platform::DeepSeek, client, endpoint),
        }
    }
}

impl ProviderAdapter for DeepSeekAdapter {
    fn platform(&self) -> Platform {
        Platform::DeepSeek
    }

    fn stream(&self, model: &str, prompt: &str, cancel: CancellationToken) -> FragmentStream {
        self.inner.stream(model, prompt, cancel)
    }
}

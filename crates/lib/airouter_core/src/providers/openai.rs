//! OpenAI chat completions provider.
//!
//! Streams `POST {base}/chat/completions` with `stream: true` and unwraps
//! `choices[0].delta.content` from each SSE chunk. The request/response
//! handling lives in [`ChatCompletions`] so OpenAI-compatible platforms can
//! reuse it with a different endpoint.

use futures_util::{StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::config::Endpoint;
use super::{
    FragmentStream, Platform, ProviderAdapter, ProviderError, cancellable, ensure_success,
    failed, sse_fragments,
};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<UpstreamError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct UpstreamError {
    message: String,
}

/// Extract the text delta from one chat-completion chunk.
pub(crate) fn decode_chunk(platform: Platform, data: &str) -> Result<Option<String>, ProviderError> {
    let chunk: ChatChunk = serde_json::from_str(data)?;
    if let Some(err) = chunk.error {
        return Err(ProviderError::Upstream {
            platform,
            message: err.message,
        });
    }
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

/// Streaming client for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub(crate) struct ChatCompletions {
    platform: Platform,
    client: Client,
    endpoint: Endpoint,
}

impl ChatCompletions {
    pub(crate) fn new(platform: Platform, client: Client, endpoint: Endpoint) -> Self {
        Self {
            platform,
            client,
            endpoint,
        }
    }

    pub(crate) fn stream(&self, model: &str, prompt: &str, cancel: CancellationToken) -> FragmentStream {
        let platform = self.platform;
        let Some(api_key) = self.endpoint.api_key.as_deref() else {
            return failed(ProviderError::MissingApiKey(platform));
        };

        let url = format!("{}/chat/completions", self.endpoint.base_url);
        let request = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("Accept", "text/event-stream")
            .json(&ChatRequest {
                model,
                messages: [ChatMessage {
                    role: "user",
                    content: prompt,
                }],
                stream: true,
            });

        debug!(%platform, %model, %url, "opening chat completion stream");

        let open = async move {
            let response = ensure_success(platform, request.send().await?).await?;
            Ok::<_, ProviderError>(sse_fragments(response, move |data| {
                decode_chunk(platform, data)
            }))
        };

        cancellable(
            futures_util::stream::once(open).try_flatten().boxed(),
            cancel,
        )
    }
}

/// OpenAI platform adapter.
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    inner: ChatCompletions,
}

impl OpenAiAdapter {
    pub fn new(client: Client, endpoint: Endpoint) -> Self {
        Self {
            inner: ChatCompletions::new(Platform::OpenAi, client, endpoint),
        }
    }
}

impl ProviderAdapter for OpenAiAdapter {
    fn platform(&self) -> Platform {
        Platform::OpenAi
    }

    fn stream(&self, model: &str, prompt: &str, cancel: CancellationToken) -> FragmentStream {
        self.inner.stream(model, prompt, cancel)
    }
}

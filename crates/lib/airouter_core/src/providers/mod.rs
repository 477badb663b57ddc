//! Upstream text-generation providers.
//!
//! Every platform implements [`ProviderAdapter`]: given a model, a prompt and
//! a cancellation token it returns a lazy [`FragmentStream`]. The stream
//! opens the upstream connection on first poll, yields text fragments in
//! upstream order, ends on upstream completion and stops pulling as soon as
//! the token fires. Dropping the stream releases the connection.
//!
//! # Platforms
//!
//! - `"gemini"`: Google Generative Language API
//! - `"openai"`: OpenAI chat completions
//! - `"deepseek"`: DeepSeek (OpenAI-compatible API)

pub mod config;
pub mod deepseek;
pub mod gemini;
pub mod openai;

use std::fmt;
use std::future;
use std::pin::Pin;
use std::str::FromStr;

use futures_util::{Stream, StreamExt, TryStreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// A pinned, sendable stream of text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Errors raised while selecting or driving a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("empty prompt")]
    EmptyPrompt,

    #[error("{0} API key not configured")]
    MissingApiKey(Platform),

    #[error("error creating stream: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{platform} returned {status}: {body}")]
    Status {
        platform: Platform,
        status: u16,
        body: String,
    },

    #[error("error receiving stream data: {0}")]
    Stream(String),

    #[error("error decoding stream data: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{platform} error: {message}")]
    Upstream { platform: Platform, message: String },
}

/// Closed set of supported upstream platforms.
///
/// Identifiers are case-sensitive: `"openai"` routes, `"OpenAI"` does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Gemini,
    OpenAi,
    DeepSeek,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Gemini, Platform::OpenAi, Platform::DeepSeek];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Gemini => "gemini",
            Platform::OpenAi => "openai",
            Platform::DeepSeek => "deepseek",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gemini" => Ok(Platform::Gemini),
            "openai" => Ok(Platform::OpenAi),
            "deepseek" => Ok(Platform::DeepSeek),
            other => Err(ProviderError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// Boundary to one upstream generation backend.
pub trait ProviderAdapter: Send + Sync {
    /// Platform this adapter serves.
    fn platform(&self) -> Platform;

    /// Start a generation. Nothing is sent upstream until the returned stream
    /// is first polled.
    fn stream(&self, model: &str, prompt: &str, cancel: CancellationToken) -> FragmentStream;
}

/// A stream that yields a single error and ends.
pub fn failed(err: ProviderError) -> FragmentStream {
    Box::pin(futures_util::stream::once(future::ready(Err(err))))
}

/// Stop yielding as soon as `cancel` fires, without waiting for the next
/// upstream item.
pub fn cancellable<S>(inner: S, cancel: CancellationToken) -> FragmentStream
where
    S: Stream<Item = Result<String, ProviderError>> + Send + 'static,
{
    Box::pin(inner.take_until(cancel.cancelled_owned()))
}

/// Turn an upstream SSE response into fragments.
///
/// `decode` maps each event's `data` payload to at most one fragment; events
/// without text yield nothing. A `[DONE]` payload ends the stream.
pub(crate) fn sse_fragments<F>(
    response: reqwest::Response,
    decode: F,
) -> impl Stream<Item = Result<String, ProviderError>> + Send + 'static
where
    F: Fn(&str) -> Result<Option<String>, ProviderError> + Send + 'static,
{
    sse_stream::SseStream::from_byte_stream(response.bytes_stream())
        .map_err(|e| ProviderError::Stream(e.to_string()))
        .try_take_while(|sse| future::ready(Ok(sse.data.as_deref() != Some(DONE_SENTINEL))))
        .try_filter_map(move |sse| {
            future::ready(match sse.data.as_deref() {
                Some(data) if !data.trim().is_empty() => decode(data),
                _ => Ok(None),
            })
        })
}

/// Fail with the upstream body when the response is not a success.
pub(crate) async fn ensure_success(
    platform: Platform,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(ProviderError::Status {
        platform,
        status,
        body,
    })
}

const DONE_SENTINEL: &str = "[DONE]";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_platforms_parse() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
    }

    #[test]
    fn platform_ids_are_case_sensitive() {
        assert!("OpenAI".parse::<Platform>().is_err());
        assert!("GEMINI".parse::<Platform>().is_err());
        assert!("".parse::<Platform>().is_err());
        assert!(matches!(
            "azure".parse::<Platform>(),
            Err(ProviderError::UnsupportedPlatform(ref p)) if p == "azure"
        ));
    }

    #[tokio::test]
    async fn cancellable_stops_pending_stream() {
        let cancel = CancellationToken::new();
        let mut stream = cancellable(
            futures_util::stream::iter(vec![Ok("a".to_string())])
                .chain(futures_util::stream::pending()),
            cancel.clone(),
        );

        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        cancel.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn failed_yields_one_error() {
        let mut stream = failed(ProviderError::EmptyPrompt);
        assert!(matches!(
            stream.next().await,
            Some(Err(ProviderError::EmptyPrompt))
        ));
        assert!(stream.next().await.is_none());
    }
}

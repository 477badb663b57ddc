//! Google Gemini provider.
//!
//! Calls `models/{model}:streamGenerateContent?alt=sse` and concatenates the
//! text parts of the first candidate in each chunk.

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
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
}

/// Extract the text carried by one `GenerateContentResponse` chunk.
pub(crate) fn decode_chunk(data: &str) -> Result<Option<String>, ProviderError> {
    let chunk: GenerateChunk = serde_json::from_str(data)?;
    if let Some(err) = chunk.error {
        return Err(ProviderError::Upstream {
            platform: Platform::Gemini,
            message: err.message,
        });
    }

    let text: String = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    Ok((!text.is_empty()).then_some(text))
}

/// Gemini platform adapter.
#[derive(Debug, Clone)]
pub struct GeminiAdapter {
    client: Client,
    endpoint: Endpoint,
}

impl GeminiAdapter {
    pub fn new(client: Client, endpoint: Endpoint) -> Self {
        Self { client, endpoint }
    }
}

impl ProviderAdapter for GeminiAdapter {
    fn platform(&self) -> Platform {
        Platform::Gemini
    }

    fn stream(&self, model: &str, prompt: &str, cancel: CancellationToken) -> FragmentStream {
        let Some(api_key) = self.endpoint.api_key.as_deref() else {
            return failed(ProviderError::MissingApiKey(Platform::Gemini));
        };

        let url = format!(
            "{}/v1beta/models/{model}:streamGenerateContent",
            self.endpoint.base_url
        );
        let request = self
            .client
            .post(&url)
            .query(&[("alt", "sse")])
            .header("x-goog-api-key", api_key)
            .json(&GenerateRequest {
                contents: [Content {
                    role: "user",
                    parts: [Part { text: prompt }],
                }],
            });

        debug!(%model, %url, "opening gemini stream");

        let open = async move {
            let response = ensure_success(Platform::Gemini, request.send().await?).await?;
            Ok::<_, ProviderError>(sse_fragments(response, decode_chunk))
        };

        cancellable(
            futures_util::stream::once(open).try_flatten().boxed(),
            cancel,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_candidate_text() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"Hel"},{"text":"lo"}],"role":"model"}}]}"#;
        assert_eq!(decode_chunk(data).unwrap(), Some("Hello".to_string()));
    }

    #[test]
    fn chunk_without_text_yields_nothing() {
        let data = r#"{"candidates":[{"content":{"parts":[],"role":"model"},"finishReason":"STOP"}],"usageMetadata":{}}"#;
        assert_eq!(decode_chunk(data).unwrap(), None);
        assert_eq!(decode_chunk(r#"{"candidates":[]}"#).unwrap(), None);
        assert_eq!(decode_chunk(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap(), None);
    }

    #[test]
    fn error_payload_is_surfaced() {
        let data = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        let err = decode_chunk(data).unwrap_err();
        assert_eq!(err.to_string(), "gemini error: API key not valid");
    }
}

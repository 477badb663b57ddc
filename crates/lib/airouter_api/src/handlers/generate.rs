//! Generation handler: validates the call, resolves the platform and hands
//! the provider stream to the response relay.
//!
//! Everything that can fail with a status code happens before
//! [`Relay::open`]. After that the outcome is reported in-band.

use axum::Extension;
use axum::body::Body;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::relay::{self, Relay, RelayOutcome};
use crate::routes::{MODEL_HEADER, PLATFORM_HEADER};

/// Largest accepted prompt body.
pub const MAX_PROMPT_BYTES: usize = 1024 * 1024;

fn required_header<'a>(headers: &'a HeaderMap, name: &str, label: &str) -> AppResult<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{label} header is required")))
}

/// `POST /api/v1/ai/generate`: stream a completion for the raw UTF-8 prompt
/// in the body, using the `Platform` and `Model` headers to pick the upstream.
pub async fn generate_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    body: Body,
) -> AppResult<Response> {
    let platform = required_header(&headers, PLATFORM_HEADER, "Platform")?.to_string();
    let model = required_header(&headers, MODEL_HEADER, "Model")?.to_string();

    let bytes = axum::body::to_bytes(body, MAX_PROMPT_BYTES)
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read request body: {e}")))?;
    let prompt = String::from_utf8(bytes.to_vec())
        .map_err(|_| AppError::Validation("Request body must be UTF-8 text".into()))?;

    let route = state.strategy.resolve(&platform)?;

    let span = info_span!(
        "generate",
        user_id = %user.user_id(),
        platform = %route.platform(),
        model = %model,
    );
    span.in_scope(|| info!(prompt_bytes = prompt.len(), "generation started"));

    let cancel = CancellationToken::new();
    let (sink, body) = relay::channel(&cancel);
    let relay = Relay::open(sink)?.with_deadline(state.config.generation_timeout);
    let fragments = route.stream(&model, &prompt, cancel.clone());

    tokio::spawn(
        async move {
            match relay.run(fragments, cancel).await {
                RelayOutcome::Completed { fragments } => {
                    info!(fragments, "generation completed");
                }
                RelayOutcome::Failed { fragments, message } => {
                    warn!(fragments, error = %message, "generation failed");
                }
                RelayOutcome::Cancelled { fragments } => {
                    info!(fragments, "generation cancelled");
                }
                RelayOutcome::Stalled { fragments } => {
                    warn!(fragments, "client stopped reading; generation abandoned");
                }
            }
        }
        .instrument(span),
    );

    Ok(relay::event_stream_response(body))
}

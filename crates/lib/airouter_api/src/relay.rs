//! Response relay: server-sent-event framing for generation streams.
//!
//! A relay goes through two phases:
//!
//! 1. **Pending**: the caller holds a [`FrameSink`] and can still fail the
//!    whole request with an ordinary status. [`Relay::open`] is the only way
//!    forward and fails with [`RelayError::StreamingUnsupported`] if the sink
//!    cannot flush incrementally.
//! 2. **Open**: a [`Relay`] exists, headers are committed, and
//!    [`Relay::run`] can no longer return an error: every outcome is written
//!    in-band as exactly one terminal event.
//!
//! Each fragment is written and flushed before the next one is pulled from
//! the provider, so fragments are never batched.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use airouter_core::providers::{FragmentStream, ProviderError};
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Sleep;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Terminal marker written after the last fragment.
pub const DONE_MARKER: &str = "[DONE]";

/// Prefix of the terminal error event payload.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Relay failures. Only [`RelayError::StreamingUnsupported`] can reach the
/// client as a status code; the rest happen after headers are committed.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Streaming unsupported!")]
    StreamingUnsupported,

    #[error("client disconnected")]
    Disconnected,
}

/// One event on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Fragment(String),
    Done,
    Error(String),
}

impl RelayEvent {
    /// Encode as an SSE `data:` frame.
    pub fn encode(&self) -> Bytes {
        let frame = match self {
            RelayEvent::Fragment(text) => format!("data: {text}\n\n"),
            RelayEvent::Done => format!("data: {DONE_MARKER}\n\n"),
            RelayEvent::Error(message) => format!("data: {ERROR_PREFIX}{message}\n\n"),
        };
        Bytes::from(frame)
    }
}

/// How a relayed stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Provider finished; `[DONE]` was written.
    Completed { fragments: usize },
    /// Provider or deadline failure; one `ERROR:` event was written.
    Failed { fragments: usize, message: String },
    /// Client went away or the call was cancelled; nothing more was written.
    Cancelled { fragments: usize },
    /// The client stopped taking frames until the deadline passed; the
    /// pending frame was abandoned and cancellation fired.
    Stalled { fragments: usize },
}

/// Destination of relay frames.
#[async_trait]
pub trait FrameSink: Send {
    /// Whether frames can be pushed to the client one at a time.
    fn supports_flush(&self) -> bool;

    /// Buffer one frame.
    async fn write(&mut self, frame: Bytes) -> Result<(), RelayError>;

    /// Push everything buffered to the client and wait until it has been
    /// taken by the transport.
    async fn flush(&mut self) -> Result<(), RelayError>;
}

/// An open event stream.
pub struct Relay<S> {
    sink: S,
    deadline: Option<Duration>,
}

/// How long the terminal error frame may take after the deadline fired.
const TERMINAL_WRITE_GRACE: Duration = Duration::from_secs(5);

const TIMED_OUT: &str = "generation timed out";

type Deadline = Option<Pin<Box<Sleep>>>;

impl<S: FrameSink> Relay<S> {
    /// Open the stream, or fail before anything is written.
    pub fn open(sink: S) -> Result<Self, RelayError> {
        if !sink.supports_flush() {
            return Err(RelayError::StreamingUnsupported);
        }
        Ok(Self {
            sink,
            deadline: None,
        })
    }

    /// Bound the whole stream; exceeding it ends the stream with an error
    /// event and fires cancellation.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Relay fragments until the provider finishes, fails, or `cancel` fires.
    ///
    /// Both the deadline and `cancel` are honoured while waiting on the
    /// provider and while a frame is waiting to be taken by the client. The
    /// fragment stream is dropped before returning, releasing its upstream
    /// connection.
    pub async fn run(
        mut self,
        mut fragments: FragmentStream,
        cancel: CancellationToken,
    ) -> RelayOutcome {
        let mut deadline: Deadline = self.deadline.map(|d| Box::pin(tokio::time::sleep(d)));

        let mut sent = 0usize;
        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                _ = expired(&mut deadline) => Step::TimedOut,
                next = fragments.next() => Step::Next(next),
            };

            match step {
                Step::Cancelled => return RelayOutcome::Cancelled { fragments: sent },
                Step::TimedOut => {
                    drop(fragments);
                    let mut grace = Some(Box::pin(tokio::time::sleep(TERMINAL_WRITE_GRACE)));
                    let outcome = self
                        .finish(sent, RelayEvent::Error(TIMED_OUT.into()), &cancel, &mut grace)
                        .await;
                    cancel.cancel();
                    return outcome;
                }
                Step::Next(Some(Ok(fragment))) => {
                    let event = RelayEvent::Fragment(fragment);
                    match self.guarded_emit(&event, &cancel, &mut deadline).await {
                        Write::Written => sent += 1,
                        Write::Cancelled => return RelayOutcome::Cancelled { fragments: sent },
                        Write::Expired => {
                            cancel.cancel();
                            return RelayOutcome::Stalled { fragments: sent };
                        }
                        Write::Disconnected => {
                            cancel.cancel();
                            return RelayOutcome::Cancelled { fragments: sent };
                        }
                    }
                }
                Step::Next(Some(Err(e))) => {
                    drop(fragments);
                    return self
                        .finish(sent, RelayEvent::Error(e.to_string()), &cancel, &mut deadline)
                        .await;
                }
                Step::Next(None) if cancel.is_cancelled() => {
                    return RelayOutcome::Cancelled { fragments: sent };
                }
                Step::Next(None) => {
                    drop(fragments);
                    return self
                        .finish(sent, RelayEvent::Done, &cancel, &mut deadline)
                        .await;
                }
            }
        }
    }

    /// Write the terminal event and map the result to an outcome.
    async fn finish(
        &mut self,
        sent: usize,
        event: RelayEvent,
        cancel: &CancellationToken,
        deadline: &mut Deadline,
    ) -> RelayOutcome {
        match self.guarded_emit(&event, cancel, deadline).await {
            Write::Written => match event {
                RelayEvent::Error(message) => RelayOutcome::Failed {
                    fragments: sent,
                    message,
                },
                _ => RelayOutcome::Completed { fragments: sent },
            },
            Write::Expired => {
                cancel.cancel();
                RelayOutcome::Stalled { fragments: sent }
            }
            Write::Cancelled | Write::Disconnected => RelayOutcome::Cancelled { fragments: sent },
        }
    }

    /// Write and flush one event, giving up when `cancel` or the deadline
    /// fires first.
    async fn guarded_emit(
        &mut self,
        event: &RelayEvent,
        cancel: &CancellationToken,
        deadline: &mut Deadline,
    ) -> Write {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Write::Cancelled,
            _ = expired(deadline) => Write::Expired,
            written = self.emit(event) => match written {
                Ok(()) => Write::Written,
                Err(_) => Write::Disconnected,
            },
        }
    }

    async fn emit(&mut self, event: &RelayEvent) -> Result<(), RelayError> {
        self.sink.write(event.encode()).await?;
        self.sink.flush().await
    }
}

/// Resolves once the deadline has passed; never without one.
async fn expired(deadline: &mut Deadline) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

enum Step {
    Cancelled,
    TimedOut,
    Next(Option<Result<String, ProviderError>>),
}

enum Write {
    Written,
    Cancelled,
    Expired,
    Disconnected,
}

/// Sink feeding an HTTP response body through a single-slot channel.
///
/// `flush` hands the buffered bytes to the body and then waits for the slot
/// to free up again, which only happens once the transport has pulled the
/// frame.
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
    pending: Vec<u8>,
}

#[async_trait]
impl FrameSink for ChannelSink {
    fn supports_flush(&self) -> bool {
        !self.tx.is_closed()
    }

    async fn write(&mut self, frame: Bytes) -> Result<(), RelayError> {
        self.pending.extend_from_slice(&frame);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), RelayError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let frame = Bytes::from(std::mem::take(&mut self.pending));
        self.tx
            .send(frame)
            .await
            .map_err(|_| RelayError::Disconnected)?;
        let _permit = self
            .tx
            .reserve()
            .await
            .map_err(|_| RelayError::Disconnected)?;
        Ok(())
    }
}

/// Response body side of a [`ChannelSink`].
///
/// Dropping the body (client disconnect) cancels the token it was created
/// with.
pub struct RelayBody {
    rx: mpsc::Receiver<Bytes>,
    _cancel_on_drop: DropGuard,
}

impl Stream for RelayBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|frame| frame.map(Ok))
    }
}

/// Create a connected sink/body pair bound to `cancel`.
pub fn channel(cancel: &CancellationToken) -> (ChannelSink, RelayBody) {
    let (tx, rx) = mpsc::channel(1);
    (
        ChannelSink {
            tx,
            pending: Vec::new(),
        },
        RelayBody {
            rx,
            _cancel_on_drop: cancel.clone().drop_guard(),
        },
    )
}

/// Build the `200 text/event-stream` response around a relay body.
pub fn event_stream_response(body: RelayBody) -> Response {
    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

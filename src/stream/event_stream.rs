//! Per-request event stream: SSE or newline-delimited JSON.
//!
//! # Responsibilities
//! - Negotiate the outgoing content type from the `Accept` header
//! - Produce the response head (200, content type, CORS) up front
//! - Frame every event for the negotiated mode
//! - Track Open → Closed, whichever side closes first
//!
//! # Data Flow
//! ```text
//! handler ── write_data / write_error / heart beat ──▶ framing
//!     → mpsc (FIFO per stream)
//!     → FrameStream (response body)
//!     → hyper → client
//!
//! client goes away → hyper drops FrameStream → Closed
//! close()          → terminal frame (SSE) → sender dropped → body ends
//! ```

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::header::{ACCEPT, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use futures_util::Stream;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use super::negotiate::{negotiate, EVENT_STREAM, JSON_STREAM, STREAM_CANDIDATES, TEXT_HTML, TEXT_PLAIN};
use crate::observability::metrics;

const HEART_BEAT: &[u8] = b": heart beat\n";
/// Enough padding to push intermediaries past their buffering thresholds.
const FILLER_WIDTH: usize = 2048;
const END_EVENT: &str = r#"{"end":true}"#;

/// Wire framing, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// `data: <json>\n\n`, comments allowed.
    EventStream,
    /// `<json>\n`.
    Plain,
}

impl StreamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamMode::EventStream => "sse",
            StreamMode::Plain => "plain",
        }
    }

    fn frame(&self, line: &str) -> Bytes {
        match self {
            StreamMode::EventStream => Bytes::from(format!("data: {line}\n\n")),
            StreamMode::Plain => Bytes::from(format!("{line}\n")),
        }
    }
}

/// Stream lifecycle. Closed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Closed,
}

/// What moved a stream to Closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseCause {
    Local,
    Disconnected,
}

struct Sink {
    tx: mpsc::UnboundedSender<Bytes>,
    heart_beat: Option<AbortHandle>,
}

struct Shared {
    mode: StreamMode,
    /// `None` once closed.
    sink: Mutex<Option<Sink>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Option<Sink>> {
        self.sink.lock().expect("event stream mutex poisoned")
    }

    fn send(&self, frame: Bytes) -> bool {
        let guard = self.lock();
        match guard.as_ref() {
            Some(sink) => sink.tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// The single Open → Closed transition. Returns false if already closed.
    fn finish(&self, cause: CloseCause) -> bool {
        let mut guard = self.lock();
        let Some(sink) = guard.take() else {
            return false;
        };

        if cause == CloseCause::Local && self.mode == StreamMode::EventStream {
            let _ = sink.tx.send(self.mode.frame(END_EVENT));
        }
        if let Some(heart_beat) = sink.heart_beat {
            heart_beat.abort();
        }
        drop(guard);

        tracing::debug!(mode = self.mode.as_str(), cause = ?cause, "Event stream closed");
        true
    }
}

/// Response body fed by the stream's channel.
struct FrameStream {
    rx: mpsc::UnboundedReceiver<Bytes>,
    shared: Arc<Shared>,
}

impl Stream for FrameStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|frame| frame.map(Ok))
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        self.shared.finish(CloseCause::Disconnected);
    }
}

/// A streaming response bound to one request.
///
/// Writes after close are dropped and reported as `false`; they never error.
/// Dropping the last handle closes the stream.
pub struct EventStream {
    content_type: &'static str,
    shared: Arc<Shared>,
}

impl EventStream {
    /// Negotiate against the request headers and build the response that
    /// carries the stream.
    pub fn new(headers: &HeaderMap) -> (Self, Response) {
        let accept = headers.get(ACCEPT).and_then(|v| v.to_str().ok());
        Self::from_accept(accept)
    }

    /// Same as [`EventStream::new`], from a raw `Accept` value.
    pub fn from_accept(accept: Option<&str>) -> (Self, Response) {
        let content_type = match negotiate(accept, &STREAM_CANDIDATES) {
            Some(TEXT_HTML) => TEXT_PLAIN,
            Some(EVENT_STREAM) => EVENT_STREAM,
            _ => JSON_STREAM,
        };
        let mode = if content_type == EVENT_STREAM {
            StreamMode::EventStream
        } else {
            StreamMode::Plain
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            mode,
            sink: Mutex::new(Some(Sink {
                tx,
                heart_beat: None,
            })),
        });

        let body = FrameStream {
            rx,
            shared: Arc::clone(&shared),
        };
        let mut response = Response::new(Body::from_stream(body));
        let response_headers = response.headers_mut();
        response_headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        response_headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

        metrics::record_stream_opened(mode.as_str());
        tracing::debug!(content_type, "Event stream opened");

        (
            Self {
                content_type,
                shared,
            },
            response,
        )
    }

    /// The declared `Content-Type`.
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn mode(&self) -> StreamMode {
        self.shared.mode
    }

    pub fn state(&self) -> StreamState {
        if self.shared.lock().is_some() {
            StreamState::Open
        } else {
            StreamState::Closed
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state() == StreamState::Closed
    }

    /// SSE comment to keep idle connections alive.
    pub fn write_heart_beat(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.mode() != StreamMode::EventStream {
            return true;
        }
        self.shared.send(Bytes::from_static(HEART_BEAT))
    }

    /// Run [`EventStream::write_heart_beat`] every `period` until the stream
    /// closes. Replaces any earlier timer.
    pub fn spawn_heart_beat(&self, period: Duration) {
        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if shared.mode != StreamMode::EventStream {
                    continue;
                }
                if !shared.send(Bytes::from_static(HEART_BEAT)) {
                    break;
                }
            }
        });

        let mut guard = self.shared.lock();
        match guard.as_mut() {
            Some(sink) => {
                if let Some(previous) = sink.heart_beat.replace(task.abort_handle()) {
                    previous.abort();
                }
            }
            None => task.abort(),
        }
    }

    /// SSE comment padding, for clients behind buffering proxies.
    pub fn write_filler(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.mode() != StreamMode::EventStream {
            return true;
        }
        let filler = format!(": {}\n", " ".repeat(FILLER_WIDTH));
        self.shared.send(Bytes::from(filler))
    }

    /// Write one event. `body`'s top-level fields are copied into the event;
    /// a body that is not a JSON object contributes nothing.
    pub fn write_data<T: Serialize + ?Sized>(&self, id: Option<&str>, body: &T) -> bool {
        if self.is_closed() {
            return false;
        }

        let mut event = match serde_json::to_value(body) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => Map::new(),
            Err(e) => {
                tracing::error!(error = %e, "Could not serialize event");
                return true;
            }
        };

        if let Some(id) = id.filter(|id| !id.is_empty()) {
            event.insert("id".to_string(), Value::String(id.to_string()));
        }

        let line = Value::Object(event).to_string();
        self.shared.send(self.mode().frame(&line))
    }

    /// Write `{error: {name, message, ...error_props}}`.
    pub fn write_error(
        &self,
        id: Option<&str>,
        name: &str,
        message: &str,
        error_props: Option<&Map<String, Value>>,
    ) -> bool {
        let mut error = Map::new();
        error.insert("name".to_string(), Value::String(name.to_string()));
        error.insert("message".to_string(), Value::String(message.to_string()));
        if let Some(props) = error_props {
            for (key, value) in props {
                error.insert(key.clone(), value.clone());
            }
        }

        let mut event = Map::new();
        event.insert("error".to_string(), Value::Object(error));
        self.write_data(id, &event)
    }

    /// End the stream. Idempotent; returns true only for the call that
    /// actually closed it.
    pub fn close(&self) -> bool {
        self.shared.finish(CloseCause::Local)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("content_type", &self.content_type)
            .field("state", &self.state())
            .finish()
    }
}

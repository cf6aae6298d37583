//! In-flight request accounting.
//!
//! Every request joins the shared [`InFlightRequests`] set on entry and
//! leaves when its response body ends, fails, or is dropped. On server
//! shutdown a handler still running is answered with 503 and a body still
//! being sent is cut off with an error, which aborts the connection.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::BoxError;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::net::{InFlightGuard, InFlightRequests};

/// Request extension carrying the server-shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(pub CancellationToken);

#[derive(Debug, Error)]
#[error("server shutdown")]
pub struct ServerShutdown;

pub async fn account_request(
    State(in_flight): State<InFlightRequests>,
    mut request: Request,
    next: Next,
) -> Response {
    let guard = in_flight.track(request.method(), request.uri());
    request
        .extensions_mut()
        .insert(ShutdownSignal(guard.token()));

    let response = tokio::select! {
        biased;
        _ = guard.cancelled() => {
            return (StatusCode::SERVICE_UNAVAILABLE, ServerShutdown.to_string()).into_response();
        }
        response = next.run(request) => response,
    };

    let (parts, body) = response.into_parts();
    let body = AccountedBody {
        shutdown: Box::pin(guard.token().cancelled_owned()),
        inner: body.into_data_stream().boxed(),
        guard: Some(guard),
    };
    Response::from_parts(parts, Body::from_stream(body))
}

/// Response body that holds its request's membership until it ends.
struct AccountedBody {
    inner: BoxStream<'static, Result<Bytes, axum::Error>>,
    shutdown: Pin<Box<WaitForCancellationFutureOwned>>,
    guard: Option<InFlightGuard>,
}

impl Stream for AccountedBody {
    type Item = Result<Bytes, BoxError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.guard.is_none() {
            return Poll::Ready(None);
        }

        if self.shutdown.as_mut().poll(cx).is_ready() {
            self.guard = None;
            return Poll::Ready(Some(Err(ServerShutdown.into())));
        }

        match self.inner.poll_next_unpin(cx) {
            Poll::Ready(None) => {
                self.guard = None;
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                self.guard = None;
                Poll::Ready(Some(Err(e.into())))
            }
            other => other.map(|chunk| chunk.map(|r| r.map_err(Into::into))),
        }
    }
}

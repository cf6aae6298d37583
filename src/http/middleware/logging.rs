//! Request/response logging.
//!
//! Logs `==> METHOD url` on entry and `STATUS METHOD url Nms` once the
//! response body has been fully sent or abandoned, so streamed responses are
//! timed end to end.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};

use crate::observability::metrics;

/// Emits the completion line when dropped.
struct CompletionLog {
    status: StatusCode,
    method: Method,
    url: String,
    start: Instant,
}

impl Drop for CompletionLog {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        tracing::info!(
            status = self.status.as_u16(),
            method = %self.method,
            url = %self.url,
            elapsed_ms = elapsed.as_millis() as u64,
            "{} {} {} {}ms",
            self.status.as_u16(),
            self.method,
            self.url,
            elapsed.as_millis()
        );
        metrics::record_request(self.method.as_str(), self.status.as_u16(), self.start);
    }
}

pub async fn log_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let url = request.uri().to_string();

    tracing::debug!("==> {} {}", method, url);

    let response = next.run(request).await;

    let log = CompletionLog {
        status: response.status(),
        method,
        url,
        start,
    };

    let (parts, body) = response.into_parts();
    let body = LoggedBody {
        inner: body.into_data_stream().boxed(),
        log: Some(log),
    };
    Response::from_parts(parts, Body::from_stream(body))
}

/// Response body that logs completion when it ends or is dropped.
struct LoggedBody {
    inner: BoxStream<'static, Result<Bytes, axum::Error>>,
    log: Option<CompletionLog>,
}

impl Stream for LoggedBody {
    type Item = Result<Bytes, axum::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.inner.poll_next_unpin(cx);
        if let Poll::Ready(None) = polled {
            self.log = None;
        }
        polled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Request as HttpRequest;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn log(status: StatusCode) -> CompletionLog {
        CompletionLog {
            status,
            method: Method::GET,
            url: "/".to_string(),
            start: Instant::now(),
        }
    }

    #[tokio::test]
    async fn logged_body_releases_log_at_end() {
        let chunks = futures_util::stream::iter(vec![
            Ok::<_, axum::Error>(Bytes::from_static(b"a")),
            Ok(Bytes::from_static(b"b")),
        ]);
        let mut body = LoggedBody {
            inner: chunks.boxed(),
            log: Some(log(StatusCode::OK)),
        };

        assert_eq!(body.next().await.unwrap().unwrap(), "a");
        assert!(body.log.is_some());
        assert_eq!(body.next().await.unwrap().unwrap(), "b");
        assert!(body.next().await.is_none());
        assert!(body.log.is_none());
    }

    #[tokio::test]
    async fn response_passes_through() {
        let app = Router::new()
            .route("/", get(|| async { "hello" }))
            .layer(from_fn(log_request));
        let response = app
            .oneshot(HttpRequest::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }
}

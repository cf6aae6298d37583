//! The contract between the dispatcher and business-logic handlers.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::schema::RouteSpec;
use crate::http::middleware::body::BodyError;
use crate::query::ParseResult;
use crate::stream::EventStream;

/// Everything a handler gets for one validated request.
#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub uri: Uri,
    /// Schema uri key, e.g. `agents`.
    pub route: String,
    pub headers: HeaderMap,
    pub spec: Arc<RouteSpec>,
    /// Validated query; `errors` is always empty here.
    pub query: ParseResult,
    /// Parsed JSON object, for `requestBody` routes.
    pub body: Option<Map<String, Value>>,
    pub body_error: Option<BodyError>,
    /// Present on streaming routes. The stream closes once every clone is
    /// dropped.
    pub event_stream: Option<Arc<EventStream>>,
    /// `<type>` from `stream:<type>`.
    pub stream_type: Option<String>,
    /// Cancelled when the server shuts down.
    pub shutdown: CancellationToken,
}

/// A business-logic handler for one `{method, uri}`.
///
/// For streaming routes the returned response is ignored; the stream's
/// response has already been sent.
pub trait ApiHandler: Send + Sync + 'static {
    fn handle(&self, request: ApiRequest) -> BoxFuture<'static, Response>;
}

impl<F, Fut> ApiHandler for F
where
    F: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle(&self, request: ApiRequest) -> BoxFuture<'static, Response> {
        Box::pin(self(request))
    }
}

/// Handlers keyed by `{method, uri}`.
#[derive(Clone, Default)]
pub struct HandlerMap {
    handlers: HashMap<(Method, String), Arc<dyn ApiHandler>>,
}

impl HandlerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: Method, uri: impl Into<String>, handler: impl ApiHandler) {
        self.handlers.insert((method, uri.into()), Arc::new(handler));
    }

    /// Builder-style [`HandlerMap::insert`].
    pub fn with(mut self, method: Method, uri: impl Into<String>, handler: impl ApiHandler) -> Self {
        self.insert(method, uri, handler);
        self
    }

    pub fn get(&self, method: &Method, uri: &str) -> Option<Arc<dyn ApiHandler>> {
        self.handlers.get(&(method.clone(), uri.to_string())).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut routes: Vec<String> = self
            .handlers
            .keys()
            .map(|(method, uri)| format!("{method} {uri}"))
            .collect();
        routes.sort_unstable();
        f.debug_struct("HandlerMap").field("routes", &routes).finish()
    }
}

//! Schema-driven route registration and core dispatch.
//!
//! # Data Flow
//! ```text
//! request
//!     → log_request → account_request → [collect_body] → dispatch
//!     → merge url param into the raw query
//!     → GroupPlan::run (compiled at registration)
//!     → errors? 400, handler skipped
//!     → stream:<type>? open EventStream, spawn handler, send stream response
//!     → otherwise await handler response
//! ```

use std::sync::Arc;

use axum::extract::{Path, Request};
use axum::http::{Method, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::{Json, Router};
use serde_json::json;
use thiserror::Error;

use super::handler::{ApiHandler, ApiRequest, HandlerMap};
use super::schema::{RouteSchema, RouteSpec};
use crate::config::LimitsConfig;
use crate::http::middleware::{
    account_request, collect_body, log_request, RequestBody, ShutdownSignal,
};
use crate::net::InFlightRequests;
use crate::observability::metrics;
use crate::query::{GroupPlan, GroupRegistry, QueryError, RawQuery};
use crate::stream::EventStream;

/// Prefix for every schema route.
pub const API_PREFIX: &str = "/api/v1";

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("route {method} {uri}: {source}")]
    UnknownGroup {
        method: Method,
        uri: String,
        #[source]
        source: QueryError,
    },
}

/// One registered route, shared by its handlers.
struct ApiRoute {
    method: Method,
    uri: String,
    spec: Arc<RouteSpec>,
    plan: GroupPlan,
    handler: Arc<dyn ApiHandler>,
}

fn method_filter(method: &Method) -> Option<MethodFilter> {
    match method.as_str() {
        "GET" => Some(MethodFilter::GET),
        "PUT" => Some(MethodFilter::PUT),
        "POST" => Some(MethodFilter::POST),
        "DELETE" => Some(MethodFilter::DELETE),
        _ => None,
    }
}

/// Build the `/api/v1` routes for every schema entry that has a handler.
///
/// Routes without a handler are logged and left out. A route naming an
/// unknown group fails the whole build.
pub fn build_api_router(
    schema: &RouteSchema,
    handlers: &HandlerMap,
    registry: &GroupRegistry,
    in_flight: &InFlightRequests,
    limits: &LimitsConfig,
) -> Result<Router, RouterError> {
    let mut router = Router::new();

    for (method, uri, spec) in schema.iter() {
        let Some(filter) = method_filter(&method) else {
            continue;
        };

        let Some(handler) = handlers.get(&method, uri) else {
            tracing::error!(method = %method, uri = %uri, "No handler registered for route");
            continue;
        };

        let plan = registry
            .compile(&spec.parms)
            .map_err(|source| RouterError::UnknownGroup {
                method: method.clone(),
                uri: uri.to_string(),
                source,
            })?;

        let route = Arc::new(ApiRoute {
            method: method.clone(),
            uri: uri.to_string(),
            spec: Arc::new(spec.clone()),
            plan,
            handler,
        });

        let base_path = format!("{API_PREFIX}/{uri}");
        let base = {
            let route = Arc::clone(&route);
            on(filter, move |request: Request| dispatch(Arc::clone(&route), None, request))
        };
        router = router.route(&base_path, with_middleware(base, spec, in_flight, limits));

        // The capture name is fixed so methods sharing a uri may declare
        // different urlParam names; dispatch renames it.
        if spec.url_param.is_some() {
            let param_path = format!("{base_path}/{{value}}");
            let with_param = {
                let route = Arc::clone(&route);
                on(filter, move |Path(value): Path<String>, request: Request| {
                    dispatch(Arc::clone(&route), Some(value), request)
                })
            };
            router = router.route(&param_path, with_middleware(with_param, spec, in_flight, limits));
        }

        tracing::debug!(
            method = %method,
            uri = %uri,
            groups = ?route.plan.group_names().collect::<Vec<_>>(),
            streaming = spec.stream_type().is_some(),
            "Route registered"
        );
    }

    Ok(router)
}

/// Wrap a route in its middleware chain. Layers added last run first.
fn with_middleware(
    method_router: MethodRouter,
    spec: &RouteSpec,
    in_flight: &InFlightRequests,
    limits: &LimitsConfig,
) -> MethodRouter {
    let mut method_router = method_router;
    if spec.request_body {
        method_router = method_router.layer(from_fn_with_state(limits.clone(), collect_body));
    }
    method_router
        .layer(from_fn_with_state(in_flight.clone(), account_request))
        .layer(from_fn(log_request))
}

async fn dispatch(route: Arc<ApiRoute>, url_value: Option<String>, request: Request) -> Response {
    let (mut parts, _body) = request.into_parts();

    let mut query = RawQuery::parse(parts.uri.query().unwrap_or_default());
    if let (Some(name), Some(value)) = (route.spec.url_param.as_deref(), url_value) {
        if !value.is_empty() {
            query.insert(name, value);
        }
    }

    let data = route.plan.run(&query);
    if data.has_errors() {
        metrics::record_query_rejected(&route.uri);
        tracing::debug!(
            method = %route.method,
            uri = %route.uri,
            errors = ?data.errors,
            "Query validation failed"
        );
        let body = json!({
            "error": {
                "message": "errors in query string parameters",
                "errors": data.errors,
            }
        });
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    let RequestBody { body, error } = parts
        .extensions
        .remove::<RequestBody>()
        .unwrap_or_default();
    let shutdown = parts
        .extensions
        .remove::<ShutdownSignal>()
        .map(|signal| signal.0)
        .unwrap_or_default();

    let mut api_request = ApiRequest {
        method: parts.method,
        uri: parts.uri,
        route: route.uri.clone(),
        headers: parts.headers,
        spec: Arc::clone(&route.spec),
        query: data,
        body,
        body_error: error,
        event_stream: None,
        stream_type: None,
        shutdown,
    };

    let Some(stream_type) = route.spec.stream_type() else {
        return route.handler.handle(api_request).await;
    };

    let (stream, response) = EventStream::new(&api_request.headers);
    api_request.event_stream = Some(Arc::new(stream));
    api_request.stream_type = Some(stream_type.to_string());

    let handler = Arc::clone(&route.handler);
    tokio::spawn(async move {
        let _ = handler.handle(api_request).await;
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::header::CONTENT_TYPE;
    use axum::http::Request as HttpRequest;
    use serde_json::Value;
    use tower::ServiceExt;

    fn echo(request: ApiRequest) -> impl std::future::Future<Output = Response> + Send {
        async move {
            Json(json!({
                "query": request.query,
                "body": request.body,
                "bodyError": request.body_error.map(|e| e.to_string()),
            }))
            .into_response()
        }
    }

    fn router(schema: &str, handlers: HandlerMap) -> Router {
        let schema = RouteSchema::from_json(schema).unwrap();
        let mut registry = GroupRegistry::with_builtins();
        schema.register_types(&mut registry);
        build_api_router(
            &schema,
            &handlers,
            &registry,
            &InFlightRequests::new(),
            &LimitsConfig::default(),
        )
        .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request {
        HttpRequest::get(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: &'static str) -> Request {
        HttpRequest::post(uri).body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn url_param_reachable_at_both_paths() {
        let app = router(
            r#"{"GET": {"agents": {"parms": ["id"], "urlParam": "id"}}}"#,
            HandlerMap::new().with(Method::GET, "agents", echo),
        );

        let response = app.clone().oneshot(get("/api/v1/agents/42")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["query"]["id"], "42");

        let response = app.oneshot(get("/api/v1/agents?id=7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["query"]["id"], "7");
    }

    #[tokio::test]
    async fn methods_on_one_uri_may_name_the_segment_differently() {
        let app = router(
            r#"{
                "GET": {"agents": {"parms": ["id"], "urlParam": "id"}},
                "DELETE": {"agents": {"parms": ["name"], "urlParam": "name"}}
            }"#,
            HandlerMap::new()
                .with(Method::GET, "agents", echo)
                .with(Method::DELETE, "agents", echo),
        );

        let response = app.clone().oneshot(get("/api/v1/agents/42")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["query"]["id"], "42");

        let request = HttpRequest::delete("/api/v1/agents/web-1")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["query"]["name"], "web-1");
        assert_eq!(body["query"]["id"], Value::Null);
    }

    #[tokio::test]
    async fn path_segment_overrides_query() {
        let app = router(
            r#"{"GET": {"agents": {"parms": ["id"], "urlParam": "id"}}}"#,
            HandlerMap::new().with(Method::GET, "agents", echo),
        );
        let response = app.oneshot(get("/api/v1/agents/42?id=7")).await.unwrap();
        assert_eq!(json_body(response).await["query"]["id"], "42");
    }

    #[tokio::test]
    async fn validation_errors_skip_the_handler() {
        let app = router(
            r#"{"GET": {"agents": {"parms": ["agg"]}}}"#,
            HandlerMap::new().with(Method::GET, "agents", |_request: ApiRequest| async {
                StatusCode::IM_A_TEAPOT.into_response()
            }),
        );

        let response = app.oneshot(get("/api/v1/agents?agg=bogus")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"error": {
                "message": "errors in query string parameters",
                "errors": ["invalid agg value bogus"],
            }})
        );
    }

    #[tokio::test]
    async fn warnings_do_not_block() {
        let app = router(
            r#"{"GET": {"agents": {"parms": []}}}"#,
            HandlerMap::new().with(Method::GET, "agents", echo),
        );
        let response = app.oneshot(get("/api/v1/agents?extra=1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await["query"]["warnings"],
            json!(["unknown query string param \"extra\""])
        );
    }

    #[tokio::test]
    async fn body_errors_reach_the_handler() {
        let app = router(
            r#"{"POST": {"agents": {"requestBody": true}}}"#,
            HandlerMap::new().with(Method::POST, "agents", echo),
        );

        let ok = post("/api/v1/agents", r#"{"name":"a"}"#);
        let body = json_body(app.clone().oneshot(ok).await.unwrap()).await;
        assert_eq!(body["body"], json!({"name": "a"}));
        assert_eq!(body["bodyError"], Value::Null);

        let array = post("/api/v1/agents", "[1,2]");
        let body = json_body(app.oneshot(array).await.unwrap()).await;
        assert_eq!(body["body"], Value::Null);
        assert_eq!(
            body["bodyError"],
            "request body must be a JSON object, not array or primitive"
        );
    }

    #[tokio::test]
    async fn missing_handler_skips_route() {
        let app = router(
            r#"{"GET": {"agents": {}, "hosts": {}}}"#,
            HandlerMap::new().with(Method::GET, "agents", echo),
        );
        let response = app.clone().oneshot(get("/api/v1/hosts")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = app.oneshot(get("/api/v1/agents")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn unknown_group_fails_registration() {
        let schema = RouteSchema::from_json(r#"{"GET": {"agents": {"parms": ["nope"]}}}"#).unwrap();
        let handlers = HandlerMap::new().with(Method::GET, "agents", echo);
        let err = build_api_router(
            &schema,
            &handlers,
            &GroupRegistry::with_builtins(),
            &InFlightRequests::new(),
            &LimitsConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "route GET agents: unknown parse group nope");
    }

    #[tokio::test]
    async fn streaming_route_sends_sse() {
        let app = router(
            r#"{"GET": {"metrics": {"response": "stream:metric"}}}"#,
            HandlerMap::new().with(Method::GET, "metrics", |request: ApiRequest| async move {
                let stream = request.event_stream.expect("streaming route");
                assert_eq!(request.stream_type.as_deref(), Some("metric"));
                stream.write_data(None, &json!({"x": 1}));
                StatusCode::OK.into_response()
            }),
        );

        let request = HttpRequest::get("/api/v1/metrics")
            .header("accept", "text/event-stream")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.headers()[CONTENT_TYPE], "text/event-stream");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"data: {\"x\":1}\n\ndata: {\"end\":true}\n\n");
    }
}

//! Built-in echo handler.
//!
//! Answers any schema route with what the gateway made of the request:
//! the validated query, the body or its error. Streaming routes get the
//! same as a single event. Used by the binary when no business logic is
//! linked in.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::routing::{ApiRequest, HandlerMap, RouteSchema};

fn describe(request: &ApiRequest) -> Value {
    json!({
        "method": request.method.as_str(),
        "route": request.route,
        "query": request.query,
        "body": request.body,
        "bodyError": request.body_error.as_ref().map(ToString::to_string),
    })
}

pub async fn echo(request: ApiRequest) -> Response {
    let Some(stream) = request.event_stream.clone() else {
        return Json(describe(&request)).into_response();
    };

    let mut event = describe(&request);
    event["streamType"] = json!(request.stream_type);

    stream.write_filler();
    stream.write_data(None, &event);
    stream.close();
    StatusCode::OK.into_response()
}

/// Map every route in `schema` to [`echo`].
pub fn echo_handlers(schema: &RouteSchema) -> HandlerMap {
    let mut handlers = HandlerMap::new();
    for (method, uri, _) in schema.iter() {
        handlers.insert(method, uri, echo);
    }
    handlers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_gets_a_handler() {
        let schema = RouteSchema::from_json(
            r#"{"GET": {"a": {}, "b": {}}, "DELETE": {"a": {}}}"#,
        )
        .unwrap();
        let handlers = echo_handlers(&schema);
        assert_eq!(handlers.len(), 3);
        assert!(handlers.get(&axum::http::Method::DELETE, "a").is_some());
        assert!(handlers.get(&axum::http::Method::PUT, "a").is_none());
    }
}

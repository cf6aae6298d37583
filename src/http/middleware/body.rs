//! Request body collection for `requestBody` routes.
//!
//! The body is read as text whatever the content type, then parsed as JSON.
//! Problems are not answered here: they are recorded in the [`RequestBody`]
//! extension and the handler decides what to do.

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::LimitsConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BodyError {
    #[error("error processing request body: {0}")]
    Read(String),
    #[error("error processing request body: not valid UTF-8")]
    Encoding,
    #[error("{0}")]
    Json(String),
    #[error("request body must be a JSON object, not array or primitive")]
    NotObject,
}

/// Per-request outcome of body collection.
#[derive(Debug, Clone, Default)]
pub struct RequestBody {
    pub body: Option<Map<String, Value>>,
    pub error: Option<BodyError>,
}

impl RequestBody {
    fn from_result(result: Result<Map<String, Value>, BodyError>) -> Self {
        match result {
            Ok(body) => Self {
                body: Some(body),
                error: None,
            },
            Err(error) => Self {
                body: None,
                error: Some(error),
            },
        }
    }
}

/// Parse collected bytes into a JSON object.
pub fn parse_object(bytes: &Bytes) -> Result<Map<String, Value>, BodyError> {
    let text = std::str::from_utf8(bytes).map_err(|_| BodyError::Encoding)?;
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(BodyError::NotObject),
        Err(e) => Err(BodyError::Json(e.to_string())),
    }
}

pub async fn collect_body(
    State(limits): State<LimitsConfig>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let result = match axum::body::to_bytes(body, limits.max_body_bytes).await {
        Ok(bytes) => parse_object(&bytes),
        Err(e) => Err(BodyError::Read(e.to_string())),
    };
    if let Err(e) = &result {
        tracing::debug!(error = %e, "Request body rejected");
    }

    parts.extensions.insert(RequestBody::from_result(result));
    next.run(Request::from_parts(parts, Body::empty())).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_parse() {
        let map = parse_object(&Bytes::from_static(br#"{"a": 1}"#)).unwrap();
        assert_eq!(map["a"], 1);
    }

    #[test]
    fn arrays_and_primitives_are_rejected() {
        assert_eq!(parse_object(&Bytes::from_static(b"[1]")), Err(BodyError::NotObject));
        assert_eq!(parse_object(&Bytes::from_static(b"\"s\"")), Err(BodyError::NotObject));
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(
            parse_object(&Bytes::from_static(b"{nope")),
            Err(BodyError::Json(_))
        ));
        assert!(matches!(parse_object(&Bytes::new()), Err(BodyError::Json(_))));
        assert_eq!(parse_object(&Bytes::from_static(&[0xff, 0xfe])), Err(BodyError::Encoding));
    }
}

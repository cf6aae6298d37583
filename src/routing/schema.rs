//! Declarative route schema.
//!
//! ```json
//! {
//!   "GET": {
//!     "agents": { "parms": ["agentScope", "!id"], "urlParam": "id" },
//!     "metrics": { "parms": ["agentScope", "startEnd", "interval", "agg"],
//!                  "response": "stream:metric" }
//!   },
//!   "POST": { "agents": { "parms": [], "requestBody": true } },
//!   "params": { "types": { "metric": {} } }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use axum::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::query::GroupRegistry;

const STREAM_PREFIX: &str = "stream:";

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unable to read route schema: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid route schema: {0}")]
    Json(#[from] serde_json::Error),
}

/// Every route the gateway serves, by method then uri.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RouteSchema {
    #[serde(rename = "GET", default)]
    pub get: BTreeMap<String, RouteSpec>,

    #[serde(rename = "PUT", default)]
    pub put: BTreeMap<String, RouteSpec>,

    #[serde(rename = "POST", default)]
    pub post: BTreeMap<String, RouteSpec>,

    #[serde(rename = "DELETE", default)]
    pub delete: BTreeMap<String, RouteSpec>,

    #[serde(default)]
    pub params: ParamsSchema,
}

/// Extra query keys known to the schema.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ParamsSchema {
    /// Each key becomes a passthrough group of the same name.
    #[serde(default)]
    pub types: BTreeMap<String, Value>,
}

/// One `{method, uri}` entry.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RouteSpec {
    /// Group tokens, run in order.
    #[serde(default)]
    pub parms: Vec<String>,

    /// Name of the optional trailing path segment.
    #[serde(rename = "urlParam", default, skip_serializing_if = "Option::is_none")]
    pub url_param: Option<String>,

    /// Collect and parse a JSON body.
    #[serde(rename = "requestBody", default)]
    pub request_body: bool,

    /// Free-form; a `"stream:<type>"` string marks a streaming route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl RouteSpec {
    /// The `<type>` of a `stream:<type>` response.
    pub fn stream_type(&self) -> Option<&str> {
        self.response.as_ref()?.as_str()?.strip_prefix(STREAM_PREFIX)
    }
}

impl RouteSchema {
    /// Methods routes may be declared under, in registration order.
    pub const METHODS: [Method; 4] = [Method::GET, Method::PUT, Method::POST, Method::DELETE];

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Routes declared for `method`.
    pub fn routes(&self, method: &Method) -> Option<&BTreeMap<String, RouteSpec>> {
        match method.as_str() {
            "GET" => Some(&self.get),
            "PUT" => Some(&self.put),
            "POST" => Some(&self.post),
            "DELETE" => Some(&self.delete),
            _ => None,
        }
    }

    /// Every route as `(method, uri, spec)`.
    pub fn iter(&self) -> impl Iterator<Item = (Method, &str, &RouteSpec)> {
        Self::METHODS.into_iter().flat_map(move |method| {
            self.routes(&method)
                .into_iter()
                .flatten()
                .map(move |(uri, spec)| (method.clone(), uri.as_str(), spec))
        })
    }

    /// Register `params.types` keys as passthrough groups.
    pub fn register_types(&self, registry: &mut GroupRegistry) {
        for key in self.params.types.keys() {
            registry.register_passthrough(key.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"{
        "GET": {
            "agents": { "parms": ["agentScope"], "urlParam": "id" },
            "metrics": { "parms": ["startEnd"], "response": "stream:metric" }
        },
        "POST": { "agents": { "requestBody": true } },
        "params": { "types": { "metric": { "type": "string" } } }
    }"#;

    #[test]
    fn parses_routes_in_method_order() {
        let schema = RouteSchema::from_json(SCHEMA).unwrap();
        let routes: Vec<_> = schema.iter().map(|(m, uri, _)| (m, uri.to_string())).collect();
        assert_eq!(
            routes,
            vec![
                (Method::GET, "agents".to_string()),
                (Method::GET, "metrics".to_string()),
                (Method::POST, "agents".to_string()),
            ]
        );
    }

    #[test]
    fn route_fields() {
        let schema = RouteSchema::from_json(SCHEMA).unwrap();
        let agents = &schema.get["agents"];
        assert_eq!(agents.url_param.as_deref(), Some("id"));
        assert_eq!(agents.stream_type(), None);
        assert!(schema.post["agents"].request_body);
        assert!(schema.post["agents"].parms.is_empty());
        assert_eq!(schema.get["metrics"].stream_type(), Some("metric"));
    }

    #[test]
    fn non_string_response_is_not_a_stream() {
        let spec: RouteSpec = serde_json::from_str(r#"{"response": {"type": "object"}}"#).unwrap();
        assert_eq!(spec.stream_type(), None);
    }

    #[test]
    fn types_become_passthrough_groups() {
        let schema = RouteSchema::from_json(SCHEMA).unwrap();
        let mut registry = GroupRegistry::with_builtins();
        schema.register_types(&mut registry);
        assert!(registry.contains("metric"));
    }
}

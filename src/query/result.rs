//! Output of a validation run.

use std::collections::BTreeMap;

use serde::Serialize;

/// A validated field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Zero and the empty string count as "not set" for cross-field checks.
    pub(crate) fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Integer(n) => *n != 0,
            FieldValue::Text(s) => !s.is_empty(),
            FieldValue::List(_) => true,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

/// Validated query data plus the diagnostics collected on the way.
///
/// Serializes flat: the fields sit next to `errors` and `warnings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseResult {
    #[serde(flatten)]
    fields: BTreeMap<String, FieldValue>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ParseResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_integer)
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        self.get(name).and_then(FieldValue::as_list)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    /// All validated fields, sorted by name.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some_and(FieldValue::is_truthy)
    }

    /// Rules that span more than one group. Run after every group.
    pub(crate) fn apply_semantic_rules(&mut self) {
        // An interval implies some aggregation.
        if self.interval_is_bucketed() && !self.is_set("agg") {
            self.set("agg", super::groups::DEFAULT_AGG);
        }

        // `interval` already holds milliseconds here, so any bucketed value
        // combined with agg=raw lands in this branch.
        if self.interval_is_bucketed() && self.text("agg") == Some(super::groups::RAW) {
            self.error("when interval is specifed, agg must not be raw");
            self.set("interval", super::groups::RAW);
        }
    }

    fn interval_is_bucketed(&self) -> bool {
        self.is_set("interval") && self.text("interval") != Some(super::groups::RAW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_flat() {
        let mut result = ParseResult::new();
        result.set("duration", 5i64);
        result.set("fields", FieldValue::List(vec!["cpu".into()]));
        result.warn("unknown query string param \"x\"");

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "duration": 5,
                "fields": ["cpu"],
                "errors": [],
                "warnings": ["unknown query string param \"x\""]
            })
        );
    }

    #[test]
    fn zero_interval_skips_semantic_rules() {
        let mut result = ParseResult::new();
        result.set("interval", 0i64);
        result.apply_semantic_rules();
        assert!(!result.contains("agg"));
    }

    #[test]
    fn raw_agg_with_interval_is_an_error() {
        let mut result = ParseResult::new();
        result.set("interval", 60_000i64);
        result.set("agg", "raw");
        result.apply_semantic_rules();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.text("interval"), Some("raw"));
    }
}

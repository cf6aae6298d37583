//! Raw query-string parameters, before any group has looked at them.
//!
//! # Responsibilities
//! - Decode `application/x-www-form-urlencoded` query strings
//! - Fold repeated keys into a multi-value entry
//! - Preserve first-seen key order (warnings are reported in that order)
//! - Drop empty values before validation runs

use url::form_urlencoded;

/// A single raw parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// Key appeared once.
    Single(String),
    /// Key appeared more than once (or was supplied as a list).
    Multi(Vec<String>),
}

impl QueryValue {
    /// First value, regardless of arity.
    pub fn first(&self) -> Option<&str> {
        match self {
            QueryValue::Single(v) => Some(v.as_str()),
            QueryValue::Multi(vs) => vs.first().map(String::as_str),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(prev) => {
                let prev = std::mem::take(prev);
                *self = QueryValue::Multi(vec![prev, value]);
            }
            QueryValue::Multi(vs) => vs.push(value),
        }
    }

    /// Strip empty strings; `None` when nothing is left.
    fn pruned(&self) -> Option<QueryValue> {
        match self {
            QueryValue::Single(v) if v.is_empty() => None,
            QueryValue::Single(v) => Some(QueryValue::Single(v.clone())),
            QueryValue::Multi(vs) => {
                let kept: Vec<String> = vs.iter().filter(|v| !v.is_empty()).cloned().collect();
                if kept.is_empty() {
                    None
                } else {
                    Some(QueryValue::Multi(kept))
                }
            }
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(value)
    }
}

impl From<Vec<&str>> for QueryValue {
    fn from(values: Vec<&str>) -> Self {
        QueryValue::Multi(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        QueryValue::Multi(values)
    }
}

/// Ordered map of raw query parameters.
///
/// Small enough in practice that a linear scan beats hashing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuery {
    entries: Vec<(String, QueryValue)>,
}

impl RawQuery {
    /// Create an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw query string (without the leading `?`).
    pub fn parse(query: &str) -> Self {
        let mut raw = Self::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            raw.append(key.into_owned(), value.into_owned());
        }
        raw
    }

    /// Add a value; a repeated key turns into a multi-value entry.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => existing.push(value),
            None => self.entries.push((key, QueryValue::Single(value))),
        }
    }

    /// Set a key, replacing any previous value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Look up a key without consuming it.
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Remove a key and hand back its value.
    pub fn take(&mut self, key: &str) -> Option<QueryValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Keys in first-seen order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy with empty values (and lists that end up empty) removed.
    pub(crate) fn pruned(&self) -> RawQuery {
        let entries = self
            .entries
            .iter()
            .filter_map(|(k, v)| v.pruned().map(|v| (k.clone(), v)))
            .collect();
        RawQuery { entries }
    }
}

impl<K, V> FromIterator<(K, V)> for RawQuery
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut raw = RawQuery::new();
        for (key, value) in iter {
            raw.insert(key, value);
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_folds_repeated_keys() {
        let raw = RawQuery::parse("tag=a&id=1&tag=b&tag=c");
        assert_eq!(
            raw.get("tag"),
            Some(&QueryValue::Multi(vec!["a".into(), "b".into(), "c".into()]))
        );
        assert_eq!(raw.get("id"), Some(&QueryValue::Single("1".into())));
        assert_eq!(raw.keys().collect::<Vec<_>>(), vec!["tag", "id"]);
    }

    #[test]
    fn parse_decodes_percent_and_plus() {
        let raw = RawQuery::parse("name=cpu%20usage&app=my+app");
        assert_eq!(raw.get("name").and_then(QueryValue::first), Some("cpu usage"));
        assert_eq!(raw.get("app").and_then(QueryValue::first), Some("my app"));
    }

    #[test]
    fn pruned_drops_empty_values() {
        let raw: RawQuery = [
            ("a", QueryValue::from("")),
            ("b", QueryValue::from(vec!["", ""])),
            ("c", QueryValue::from(vec!["", "x"])),
            ("d", QueryValue::from("y")),
        ]
        .into_iter()
        .collect();

        let pruned = raw.pruned();
        assert_eq!(pruned.keys().collect::<Vec<_>>(), vec!["c", "d"]);
        assert_eq!(pruned.get("c"), Some(&QueryValue::Multi(vec!["x".into()])));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut raw = RawQuery::parse("id=1&app=x");
        raw.insert("id", "2");
        assert_eq!(raw.keys().collect::<Vec<_>>(), vec!["id", "app"]);
        assert_eq!(raw.take("id"), Some(QueryValue::Single("2".into())));
        assert_eq!(raw.take("id"), None);
        assert_eq!(raw.len(), 1);
    }
}

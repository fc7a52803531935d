use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ScrapeError;

/// Request-scoped arguments handed to a capability.
///
/// Built from the query string first and the request body second, so body
/// values win on key collision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBag {
    values: Map<String, Value>,
}

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Overlays `other` on top of `self`; keys from `other` replace existing ones.
    pub fn merge(&mut self, other: ParameterBag) {
        for (key, value) in other.values {
            self.values.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// String form of a scalar parameter. Empty strings, null, arrays and
    /// objects count as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.text(key).unwrap_or_else(|| default.to_string())
    }

    pub fn required_text(&self, key: &str, message: &str) -> Result<String, ScrapeError> {
        self.text(key).ok_or_else(|| ScrapeError::validation(message))
    }

    /// Boolean parameter. Accepts JSON booleans and the strings "true"/"false"
    /// so flags can be passed on a query string. `Ok(None)` when absent.
    pub fn flag(&self, key: &str, message: &str) -> Result<Option<bool>, ScrapeError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) if s == "true" => Ok(Some(true)),
            Some(Value::String(s)) if s == "false" => Ok(Some(false)),
            Some(_) => Err(ScrapeError::validation(message)),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

impl From<Map<String, Value>> for ParameterBag {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ParameterBag {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut bag = ParameterBag::new();
        for (key, value) in iter {
            bag.insert(key, value);
        }
        bag
    }
}

//! Stored value encoding
//!
//! Every value captured from a structured store travels through one string
//! encoding. Values are tagged at capture time with the shape they had in
//! the page (`json` for anything JSON-representable, `text` for everything
//! else), so restore never has to guess by re-parsing. Dumps written by
//! older versions carried bare strings; those are still accepted and decoded
//! with the original best-effort parse.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single captured store value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum StoredValue {
    /// The value serialized cleanly to JSON; `data` is its structured form.
    Json(Value),
    /// The value did not serialize to JSON; `data` is its string form.
    Text(String),
}

impl StoredValue {
    /// Decode a value from a legacy untagged dump entry.
    ///
    /// Older dumps stored every value as one string and re-parsed it on
    /// restore: attempt a JSON parse, keep the raw string on failure. A
    /// plain string that happens to be valid JSON is reinterpreted as
    /// structured data here; that ambiguity is confined to this path.
    pub fn from_legacy(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(parsed) => StoredValue::Json(parsed),
            Err(_) => StoredValue::Text(raw.to_string()),
        }
    }

    /// The plain value to hand back to the page when writing this entry.
    pub fn to_plain(&self) -> Value {
        match self {
            StoredValue::Json(value) => value.clone(),
            StoredValue::Text(text) => Value::String(text.clone()),
        }
    }
}

impl From<Value> for StoredValue {
    fn from(value: Value) -> Self {
        StoredValue::Json(value)
    }
}

impl<'de> Deserialize<'de> for StoredValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(tag = "kind", content = "data", rename_all = "lowercase")]
        enum Tagged {
            Json(Value),
            Text(String),
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Tagged(Tagged),
            Legacy(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Tagged(Tagged::Json(value)) => StoredValue::Json(value),
            Repr::Tagged(Tagged::Text(text)) => StoredValue::Text(text),
            Repr::Legacy(raw) => StoredValue::from_legacy(&raw),
        })
    }
}

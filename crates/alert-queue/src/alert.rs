//! Alert record as delivered by the backend.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Stable identity of an alert. Backends key rows either by serial
/// integer or by uuid/text, so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlertId {
    Int(i64),
    Text(String),
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for AlertId {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for AlertId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// A single alert to display once.
///
/// Everything other than `id` and `is_shown` is display payload and is
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_shown: bool,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// Nullable `is_shown` columns deliver `null` for rows never touched.
fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl Alert {
    pub fn new(id: impl Into<AlertId>, payload: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            is_shown: false,
            payload,
        }
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = String;

/// Stable per-row correlation id between a row descriptor and its image part
pub type ClientIndex = u32;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// A scalar coming back from the backend that may be either a JSON string or a
/// JSON number (prices, quantities and ids are not consistently typed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteScalar {
    Text(String),
    Number(serde_json::Number),
}

impl RemoteScalar {
    /// Trimmed text form, `None` when empty
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            RemoteScalar::Text(s) => s.trim().to_string(),
            RemoteScalar::Number(n) => n.to_string(),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl From<&str> for RemoteScalar {
    fn from(value: &str) -> Self {
        RemoteScalar::Text(value.to_string())
    }
}

impl From<i64> for RemoteScalar {
    fn from(value: i64) -> Self {
        RemoteScalar::Number(serde_json::Number::from(value))
    }
}

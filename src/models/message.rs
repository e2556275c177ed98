//! Event message envelope produced by a message source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    /// Opaque payload text, parsed on demand
    pub payload: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub received: DateTime<Utc>,
    #[serde(default)]
    pub accepted: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            receipt: None,
            trace_id: None,
            priority: 0,
            headers: HashMap::new(),
            received: Utc::now(),
            accepted: None,
        }
    }

    /// A message with a random id carrying `payload` serialized as JSON.
    pub fn from_json(payload: &Value) -> Self {
        Self::new(Uuid::new_v4().to_string(), payload.to_string())
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Structured payload, or the raw text as a JSON string when it does not parse.
    pub fn parsed_payload(&self) -> Value {
        parse_payload(&self.payload)
    }
}

/// Parse payload text as JSON, keeping the raw text when it is not JSON.
pub fn parse_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_parses_json() {
        let message = Message::new("m1", r#"{"orderId":"B"}"#);
        assert_eq!(message.parsed_payload(), json!({"orderId": "B"}));
    }

    #[test]
    fn test_unparseable_payload_kept_as_text() {
        let message = Message::new("m1", "order B shipped");
        assert_eq!(message.parsed_payload(), json!("order B shipped"));
    }
}

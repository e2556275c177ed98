//! Durable wrapper around one deferred action invocation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::Action;

/// Wire form: `{messageId, receiptHandle, action, eventId, payload, event, retried}`.
/// Unknown fields are ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryEnvelope {
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub receipt_handle: String,
    pub action: Action,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub retried: i32,
}

impl RetryEnvelope {
    pub fn new(action: Action, payload: Value, event: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            receipt_handle: String::new(),
            action,
            event_id: event_id.into(),
            payload,
            event: event.into(),
            retried: 0,
        }
    }

    /// Whether a successful run should publish another delivery. The count
    /// includes the run that just finished, so `retry_count` bounds the total.
    pub fn has_deliveries_remaining(&self) -> bool {
        self.retried + 1 < self.action.retry_count
    }

    /// The follow-up delivery: fresh message id, `retried + 1`
    pub fn next_delivery(&self) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            receipt_handle: String::new(),
            retried: self.retried + 1,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FindUpdate;
    use serde_json::json;

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let raw = json!({
            "messageId": "m-1",
            "receiptHandle": "r-1",
            "action": {"action": "find_update", "find_update": {"workflowName": "wf"}},
            "eventId": "e-1",
            "payload": {"orderId": "A"},
            "event": "sqs:orders",
            "retried": 1,
            "futureField": {"nested": true}
        });
        let envelope: RetryEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.retried, 1);
        assert_eq!(envelope.event, "sqs:orders");
        assert_eq!(envelope.payload["orderId"], json!("A"));
    }

    #[test]
    fn test_next_delivery_increments_and_renames() {
        let action = Action::find_update(FindUpdate::new("wf")).with_retry(2, 5);
        let first = RetryEnvelope::new(action, json!({}), "sqs:orders", "e-1");
        let second = first.next_delivery();
        assert_eq!(second.retried, 1);
        assert_ne!(second.message_id, first.message_id);
        assert!(first.has_deliveries_remaining());
        assert!(!second.has_deliveries_remaining());
    }
}

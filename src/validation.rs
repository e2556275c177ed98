//! Input validation for incoming events and handler definitions
//!
//! Event payloads come from external producers, so size and shape limits are
//! enforced before any expression runs against them.

use crate::error::{Result, TaskerError};
use crate::models::{Action, ActionKind, EventHandler};
use serde_json::Value;

/// Maximum allowed size for an event payload (1MB)
const MAX_PAYLOAD_SIZE_BYTES: usize = 1024 * 1024;

/// Maximum nesting depth for JSON objects/arrays
const MAX_PAYLOAD_DEPTH: usize = 32;

/// Maximum number of keys in a JSON object or items in an array
const MAX_PAYLOAD_KEYS: usize = 10_000;

/// Maximum string length for JSON string values
const MAX_STRING_LENGTH: usize = 256 * 1024;

/// Validates an event payload for size and structure constraints
pub fn validate_event_payload(value: &Value) -> Result<()> {
    let serialized = serde_json::to_string(value)?;
    if serialized.len() > MAX_PAYLOAD_SIZE_BYTES {
        return Err(TaskerError::validation(format!(
            "event payload too large: {} bytes (max: {MAX_PAYLOAD_SIZE_BYTES})",
            serialized.len()
        )));
    }

    validate_depth(value, 0)
}

fn validate_depth(value: &Value, current_depth: usize) -> Result<()> {
    if current_depth > MAX_PAYLOAD_DEPTH {
        return Err(TaskerError::validation(format!(
            "event payload nesting too deep: {current_depth} (max: {MAX_PAYLOAD_DEPTH})"
        )));
    }

    match value {
        Value::Object(map) => {
            if map.len() > MAX_PAYLOAD_KEYS {
                return Err(TaskerError::validation(format!(
                    "too many keys in event payload object: {} (max: {MAX_PAYLOAD_KEYS})",
                    map.len()
                )));
            }
            for (key, val) in map {
                if key.len() > MAX_STRING_LENGTH {
                    return Err(TaskerError::validation(format!(
                        "event payload key too long: {} chars",
                        key.len()
                    )));
                }
                validate_depth(val, current_depth + 1)?;
            }
        }
        Value::Array(items) => {
            if items.len() > MAX_PAYLOAD_KEYS {
                return Err(TaskerError::validation(format!(
                    "event payload array too large: {} items (max: {MAX_PAYLOAD_KEYS})",
                    items.len()
                )));
            }
            for item in items {
                validate_depth(item, current_depth + 1)?;
            }
        }
        Value::String(s) if s.len() > MAX_STRING_LENGTH => {
            return Err(TaskerError::validation(format!(
                "event payload string too long: {} chars (max: {MAX_STRING_LENGTH})",
                s.len()
            )));
        }
        _ => {}
    }

    Ok(())
}

/// The payload object named by the discriminant is present.
pub fn validate_action(action: &Action) -> Result<()> {
    match action.action {
        ActionKind::FindUpdate => action.find_update_payload().map(|_| ()),
        ActionKind::UpdateTask => action.update_task_payload().map(|_| ()),
        ActionKind::CompleteTask | ActionKind::FailTask => {
            action.task_details_payload().map(|_| ())
        }
        ActionKind::StartWorkflow => action.start_workflow_payload().map(|_| ()),
        ActionKind::JavaAction => action.java_action_payload().map(|_| ()),
    }?;

    if action.retry_count < 0 {
        return Err(TaskerError::validation(format!(
            "{} retryCount must not be negative",
            action.action
        )));
    }
    Ok(())
}

/// Validates an event handler definition
pub fn validate_event_handler(handler: &EventHandler) -> Result<()> {
    if handler.name.trim().is_empty() {
        return Err(TaskerError::validation("event handler name is empty"));
    }
    if handler.event.trim().is_empty() {
        return Err(TaskerError::validation(format!(
            "event handler '{}' has no event",
            handler.name
        )));
    }
    if handler.actions.is_empty() {
        return Err(TaskerError::validation(format!(
            "event handler '{}' has no actions",
            handler.name
        )));
    }
    handler.actions.iter().try_for_each(validate_action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FindUpdate;
    use serde_json::json;

    #[test]
    fn test_valid_payload() {
        let payload = json!({
            "orderId": "A-1",
            "items": [1, 2, 3],
            "customer": {"email": "test@example.com"}
        });
        assert!(validate_event_payload(&payload).is_ok());
    }

    #[test]
    fn test_payload_too_deep() {
        let mut deep = json!("leaf");
        for _ in 0..40 {
            deep = json!({ "level": deep });
        }
        assert!(validate_event_payload(&deep).is_err());
    }

    #[test]
    fn test_string_too_long() {
        let payload = json!({ "blob": "x".repeat(MAX_STRING_LENGTH + 1) });
        assert!(validate_event_payload(&payload).is_err());
    }

    #[test]
    fn test_handler_requires_matching_payload() {
        let mut action = Action::find_update(FindUpdate::new("order_flow"));
        let handler = EventHandler::new("orders", "sqs:orders").with_action(action.clone());
        assert!(validate_event_handler(&handler).is_ok());

        action.find_update = None;
        let handler = EventHandler::new("orders", "sqs:orders").with_action(action);
        assert!(validate_event_handler(&handler).is_err());

        assert!(validate_event_handler(&EventHandler::new("orders", "sqs:orders")).is_err());
    }
}

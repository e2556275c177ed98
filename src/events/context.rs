//! Correlation context carried explicitly through event handling.

use tracing::{info_span, Span};
use uuid::Uuid;

use crate::models::Message;

/// Identifies one event message while it flows through the processor,
/// action handlers, and retry workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext {
    pub trace_id: String,
    pub event: String,
    pub message_id: String,
}

impl EventContext {
    pub fn new(event: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            event: event.into(),
            message_id: message_id.into(),
        }
    }

    /// Reuses the message's trace id when it carries one.
    pub fn from_message(event: impl Into<String>, message: &Message) -> Self {
        Self {
            trace_id: message
                .trace_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            event: event.into(),
            message_id: message.id.clone(),
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    pub fn span(&self) -> Span {
        info_span!(
            "event",
            trace_id = %self.trace_id,
            event = %self.event,
            message_id = %self.message_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_taken_from_message() {
        let message = Message::new("m-1", "{}").with_trace_id("trace-7");
        let ctx = EventContext::from_message("sqs:orders", &message);
        assert_eq!(ctx.trace_id, "trace-7");
        assert_eq!(ctx.message_id, "m-1");

        let ctx = EventContext::from_message("sqs:orders", &Message::new("m-2", "{}"));
        assert!(!ctx.trace_id.is_empty());
    }
}

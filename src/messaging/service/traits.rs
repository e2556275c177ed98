//! # Durable Queue Traits

use std::time::Duration;

use async_trait::async_trait;

use super::types::{MessageId, QueuedMessage, ReceiptHandle};
use super::MessagingError;

/// Lease-based queue operations shared by every provider
#[async_trait]
pub trait DurableQueue: Send + Sync + 'static {
    /// Create a queue if it doesn't exist (idempotent)
    async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError>;

    /// Publish a batch; each message becomes visible after `delay`.
    async fn publish<T: QueueMessage>(
        &self,
        queue_name: &str,
        messages: &[T],
        delay: Duration,
    ) -> Result<Vec<MessageId>, MessagingError>;

    /// Lease up to `max_messages` visible messages for `visibility_timeout`.
    ///
    /// A leased message that is not deleted before the timeout expires
    /// becomes visible again.
    async fn receive<T: QueueMessage>(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueuedMessage<T>>, MessagingError>;

    /// Delete messages by receipt handle
    async fn delete(
        &self,
        queue_name: &str,
        receipt_handles: &[ReceiptHandle],
    ) -> Result<(), MessagingError>;

    async fn health_check(&self) -> Result<bool, MessagingError>;

    fn provider_name(&self) -> &'static str;
}

/// Message serialization contract
pub trait QueueMessage: Send + Sync + Clone + 'static {
    fn to_bytes(&self) -> Result<Vec<u8>, MessagingError>;

    fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError>
    where
        Self: Sized;
}

/// JSON serialization for any serde-compatible type
impl<T> QueueMessage for T
where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + Clone + 'static,
{
    fn to_bytes(&self) -> Result<Vec<u8>, MessagingError> {
        serde_json::to_vec(self).map_err(|e| MessagingError::message_serialization(e.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError> {
        serde_json::from_slice(bytes)
            .map_err(|e| MessagingError::message_deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
    struct Probe {
        id: u64,
    }

    #[test]
    fn test_invalid_bytes_fail_deserialization() {
        let result = Probe::from_bytes(b"not valid json");
        assert!(matches!(
            result,
            Err(MessagingError::MessageDeserialization { .. })
        ));
    }
}

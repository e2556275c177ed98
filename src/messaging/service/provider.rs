//! # Queue Provider Enum
//!
//! Enum dispatch over the durable queue providers, avoiding trait objects for
//! the generic publish/receive methods.

use std::sync::Arc;
use std::time::Duration;

use super::providers::{InMemoryQueue, PgmqQueue};
use super::traits::{DurableQueue, QueueMessage};
use super::types::{MessageId, QueuedMessage, ReceiptHandle};
use super::MessagingError;

#[derive(Debug, Clone)]
pub enum QueueProvider {
    /// PostgreSQL message queue
    Pgmq(PgmqQueue),

    /// In-process queue; the `Arc` lets tests inspect the queue they hand out
    InMemory(Arc<InMemoryQueue>),
}

impl QueueProvider {
    pub fn in_memory() -> (Self, Arc<InMemoryQueue>) {
        let queue = Arc::new(InMemoryQueue::new());
        (Self::InMemory(Arc::clone(&queue)), queue)
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Pgmq(s) => s.provider_name(),
            Self::InMemory(s) => s.provider_name(),
        }
    }

    pub async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError> {
        match self {
            Self::Pgmq(s) => s.ensure_queue(queue_name).await,
            Self::InMemory(s) => s.ensure_queue(queue_name).await,
        }
    }

    pub async fn publish<T: QueueMessage>(
        &self,
        queue_name: &str,
        messages: &[T],
        delay: Duration,
    ) -> Result<Vec<MessageId>, MessagingError> {
        match self {
            Self::Pgmq(s) => s.publish(queue_name, messages, delay).await,
            Self::InMemory(s) => s.publish(queue_name, messages, delay).await,
        }
    }

    pub async fn receive<T: QueueMessage>(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueuedMessage<T>>, MessagingError> {
        match self {
            Self::Pgmq(s) => s.receive(queue_name, max_messages, visibility_timeout).await,
            Self::InMemory(s) => s.receive(queue_name, max_messages, visibility_timeout).await,
        }
    }

    pub async fn delete(
        &self,
        queue_name: &str,
        receipt_handles: &[ReceiptHandle],
    ) -> Result<(), MessagingError> {
        match self {
            Self::Pgmq(s) => s.delete(queue_name, receipt_handles).await,
            Self::InMemory(s) => s.delete(queue_name, receipt_handles).await,
        }
    }

    pub async fn health_check(&self) -> Result<bool, MessagingError> {
        match self {
            Self::Pgmq(s) => s.health_check().await,
            Self::InMemory(s) => s.health_check().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_dispatch_shares_queue() {
        let (provider, inner) = QueueProvider::in_memory();
        assert_eq!(provider.provider_name(), "in_memory");

        provider.ensure_queue("q").await.unwrap();
        provider
            .publish("q", &[serde_json::json!({"a": 1})], Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(inner.queue_length("q").await, 1);
    }
}

//! # In-Memory Durable Queue
//!
//! Thread-safe in-memory queue with delayed delivery and visibility timeouts,
//! for tests and single-process development.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::messaging::service::traits::{DurableQueue, QueueMessage};
use crate::messaging::service::types::{MessageId, QueuedMessage, ReceiptHandle};
use crate::messaging::MessagingError;

#[derive(Debug, Clone)]
struct StoredMessage {
    id: u64,
    payload: Vec<u8>,
    enqueued_at: DateTime<Utc>,
    /// Hidden until this instant (None = visible now)
    visible_at: Option<DateTime<Utc>>,
    receive_count: u32,
}

impl StoredMessage {
    fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.visible_at.map(|vt| vt <= now).unwrap_or(true)
    }
}

#[derive(Debug)]
struct Queue {
    messages: VecDeque<StoredMessage>,
    next_id: u64,
}

impl Queue {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            next_id: 1,
        }
    }
}

/// Snapshot of a stored message, for assertions in tests
#[derive(Debug, Clone)]
pub struct PendingMessage<T> {
    pub message_id: MessageId,
    pub message: T,
    pub enqueued_at: DateTime<Utc>,
    pub visible_at: Option<DateTime<Utc>>,
    pub receive_count: u32,
}

#[derive(Debug, Default)]
pub struct InMemoryQueue {
    queues: RwLock<HashMap<String, Queue>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages stored in a queue, leased or not
    pub async fn queue_length(&self, queue_name: &str) -> usize {
        let queues = self.queues.read().await;
        queues.get(queue_name).map(|q| q.messages.len()).unwrap_or(0)
    }

    /// Messages that a receive would return right now
    pub async fn visible_count(&self, queue_name: &str) -> usize {
        let now = Utc::now();
        let queues = self.queues.read().await;
        queues
            .get(queue_name)
            .map(|q| q.messages.iter().filter(|m| m.is_visible(now)).count())
            .unwrap_or(0)
    }

    /// Decode every stored message without leasing it
    pub async fn pending<T: QueueMessage>(
        &self,
        queue_name: &str,
    ) -> Result<Vec<PendingMessage<T>>, MessagingError> {
        let queues = self.queues.read().await;
        let queue = queues
            .get(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        queue
            .messages
            .iter()
            .map(|m| -> Result<PendingMessage<T>, MessagingError> {
                Ok(PendingMessage {
                    message_id: MessageId::from(m.id),
                    message: T::from_bytes(&m.payload)?,
                    enqueued_at: m.enqueued_at,
                    visible_at: m.visible_at,
                    receive_count: m.receive_count,
                })
            })
            .collect()
    }

    /// Make every message visible now, as if all delays and leases had elapsed
    pub async fn release_all(&self, queue_name: &str) {
        let mut queues = self.queues.write().await;
        if let Some(queue) = queues.get_mut(queue_name) {
            for message in queue.messages.iter_mut() {
                message.visible_at = None;
            }
        }
    }
}

fn to_chrono(duration: Duration) -> Result<chrono::Duration, MessagingError> {
    chrono::Duration::from_std(duration)
        .map_err(|e| MessagingError::internal(format!("duration out of range: {e}")))
}

#[async_trait]
impl DurableQueue for InMemoryQueue {
    async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError> {
        let mut queues = self.queues.write().await;
        queues.entry(queue_name.to_string()).or_insert_with(Queue::new);
        Ok(())
    }

    async fn publish<T: QueueMessage>(
        &self,
        queue_name: &str,
        messages: &[T],
        delay: Duration,
    ) -> Result<Vec<MessageId>, MessagingError> {
        // Serialize outside the lock
        let payloads: Vec<Vec<u8>> = messages
            .iter()
            .map(|m| m.to_bytes())
            .collect::<Result<_, _>>()?;
        let delay = to_chrono(delay)?;

        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let now = Utc::now();
        let visible_at = (delay > chrono::Duration::zero()).then(|| now + delay);
        let mut ids = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let id = queue.next_id;
            queue.next_id += 1;
            queue.messages.push_back(StoredMessage {
                id,
                payload,
                enqueued_at: now,
                visible_at,
                receive_count: 0,
            });
            ids.push(MessageId::from(id));
        }

        Ok(ids)
    }

    async fn receive<T: QueueMessage>(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueuedMessage<T>>, MessagingError> {
        let lease = to_chrono(visibility_timeout)?;

        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let now = Utc::now();
        let mut received = Vec::new();
        for msg in queue.messages.iter_mut() {
            if received.len() >= max_messages {
                break;
            }
            if !msg.is_visible(now) {
                continue;
            }

            msg.visible_at = Some(now + lease);
            msg.receive_count += 1;

            match T::from_bytes(&msg.payload) {
                Ok(message) => received.push(QueuedMessage {
                    message_id: MessageId::from(msg.id),
                    receipt_handle: ReceiptHandle::from(msg.id),
                    message,
                    receive_count: msg.receive_count,
                    enqueued_at: msg.enqueued_at,
                }),
                Err(e) => {
                    tracing::warn!(
                        queue = %queue_name,
                        msg_id = msg.id,
                        error = %e,
                        "Skipping undecodable message; it stays leased"
                    );
                }
            }
        }

        Ok(received)
    }

    async fn delete(
        &self,
        queue_name: &str,
        receipt_handles: &[ReceiptHandle],
    ) -> Result<(), MessagingError> {
        let ids = receipt_handles
            .iter()
            .map(|h| {
                h.as_str()
                    .parse::<u64>()
                    .map_err(|_| MessagingError::invalid_receipt_handle(h.as_str()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        for id in ids {
            match queue.messages.iter().position(|m| m.id == id) {
                Some(pos) => {
                    queue.messages.remove(pos);
                }
                None => return Err(MessagingError::message_not_found(id.to_string())),
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, MessagingError> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}

//! # PGMQ Durable Queue
//!
//! PostgreSQL Message Queue provider calling the pgmq extension's SQL
//! functions directly through sqlx (`pgmq.create`, `pgmq.send`, `pgmq.read`,
//! `pgmq.delete`). pgmq works in whole seconds, so delays and visibility
//! timeouts are rounded up.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::messaging::service::traits::{DurableQueue, QueueMessage};
use crate::messaging::service::types::{MessageId, QueuedMessage, ReceiptHandle};
use crate::messaging::MessagingError;

#[derive(Debug, Clone)]
pub struct PgmqQueue {
    pool: PgPool,
}

impl PgmqQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a dedicated pool to the queue database
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, MessagingError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| MessagingError::database_connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Whole seconds, rounded up, clamped to the i32 range pgmq takes
fn whole_seconds(duration: Duration) -> i32 {
    let mut secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs += 1;
    }
    i32::try_from(secs).unwrap_or(i32::MAX)
}

#[async_trait]
impl DurableQueue for PgmqQueue {
    async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError> {
        sqlx::query("SELECT pgmq.create($1)")
            .bind(queue_name)
            .execute(&self.pool)
            .await
            .map_err(|e| MessagingError::queue_operation(queue_name, "create", e.to_string()))?;
        debug!(queue = %queue_name, "Ensured pgmq queue");
        Ok(())
    }

    async fn publish<T: QueueMessage>(
        &self,
        queue_name: &str,
        messages: &[T],
        delay: Duration,
    ) -> Result<Vec<MessageId>, MessagingError> {
        let delay_seconds = whole_seconds(delay);
        let mut ids = Vec::with_capacity(messages.len());

        for message in messages {
            let bytes = message.to_bytes()?;
            let payload: serde_json::Value = serde_json::from_slice(&bytes)
                .map_err(|e| MessagingError::message_serialization(e.to_string()))?;

            let row: (i64,) = sqlx::query_as("SELECT pgmq.send($1, $2, $3)")
                .bind(queue_name)
                .bind(&payload)
                .bind(delay_seconds)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| MessagingError::queue_operation(queue_name, "send", e.to_string()))?;
            ids.push(MessageId::from(row.0));
        }

        Ok(ids)
    }

    async fn receive<T: QueueMessage>(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueuedMessage<T>>, MessagingError> {
        let qty = i32::try_from(max_messages).unwrap_or(i32::MAX);
        let rows = sqlx::query_as::<_, (i64, i32, DateTime<Utc>, serde_json::Value)>(
            "SELECT msg_id, read_ct, enqueued_at, message FROM pgmq.read($1, $2, $3)",
        )
        .bind(queue_name)
        .bind(whole_seconds(visibility_timeout).max(1))
        .bind(qty)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MessagingError::queue_operation(queue_name, "read", e.to_string()))?;

        let mut received = Vec::with_capacity(rows.len());
        for (msg_id, read_ct, enqueued_at, message) in rows {
            let bytes = serde_json::to_vec(&message)?;
            match T::from_bytes(&bytes) {
                Ok(decoded) => received.push(QueuedMessage {
                    message_id: MessageId::from(msg_id),
                    receipt_handle: ReceiptHandle::from(msg_id),
                    message: decoded,
                    receive_count: u32::try_from(read_ct).unwrap_or(0),
                    enqueued_at,
                }),
                Err(e) => {
                    warn!(
                        queue = %queue_name,
                        msg_id = msg_id,
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
        for handle in receipt_handles {
            let msg_id = handle
                .as_i64()
                .ok_or_else(|| MessagingError::invalid_receipt_handle(handle.as_str()))?;

            let row: (bool,) = sqlx::query_as("SELECT pgmq.delete($1, $2)")
                .bind(queue_name)
                .bind(msg_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    MessagingError::queue_operation(queue_name, "delete", e.to_string())
                })?;

            if !row.0 {
                return Err(MessagingError::message_not_found(msg_id.to_string()));
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, MessagingError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| MessagingError::database_query("health_check", e.to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "pgmq"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_seconds_rounds_up() {
        assert_eq!(whole_seconds(Duration::ZERO), 0);
        assert_eq!(whole_seconds(Duration::from_millis(1)), 1);
        assert_eq!(whole_seconds(Duration::from_secs(60)), 60);
        assert_eq!(whole_seconds(Duration::from_millis(1500)), 2);
    }

    #[tokio::test]
    async fn test_pgmq_round_trip() {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            return;
        };
        let queue = PgmqQueue::connect(&url, 2).await.unwrap();
        let installed: i64 =
            sqlx::query_scalar("SELECT count(*) FROM pg_extension WHERE extname = 'pgmq'")
                .fetch_one(queue.pool())
                .await
                .unwrap();
        if installed == 0 {
            eprintln!("pgmq extension not installed; skipping");
            return;
        }
        let name = format!("events_test_{}", uuid::Uuid::new_v4().simple());
        queue.ensure_queue(&name).await.unwrap();

        queue
            .publish(&name, &[serde_json::json!({"n": 1})], Duration::ZERO)
            .await
            .unwrap();
        let leased: Vec<QueuedMessage<serde_json::Value>> =
            queue.receive(&name, 5, Duration::from_secs(30)).await.unwrap();
        assert_eq!(leased.len(), 1);
        queue
            .delete(&name, &[leased[0].receipt_handle.clone()])
            .await
            .unwrap();
    }
}

//! # Message Source
//!
//! Correlation lookup for Wait tasks: find one recorded event message whose
//! JSON payload contains a query object. Containment follows PostgreSQL's
//! `jsonb @>` rules, so the in-memory and Postgres sources agree.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::MessagingError;
use crate::models::{parse_payload, Message};

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Oldest recorded message whose payload contains `query`
    async fn find_message_by_query(
        &self,
        query: &Map<String, Value>,
    ) -> Result<Option<Message>, MessagingError>;

    /// Record an incoming message so later queries can find it (idempotent per id)
    async fn record_message(&self, message: &Message) -> Result<(), MessagingError>;
}

/// `jsonb @>` containment: objects match on a key subset, arrays on an
/// element subset, scalars on equality.
pub fn json_contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Object(h), Value::Object(n)) => n
            .iter()
            .all(|(key, nv)| h.get(key).is_some_and(|hv| json_contains(hv, nv))),
        (Value::Array(h), Value::Array(n)) => n
            .iter()
            .all(|nv| h.iter().any(|hv| json_contains(hv, nv))),
        // a top-level array contains a bare scalar it holds
        (Value::Array(h), scalar) if !scalar.is_object() && !scalar.is_array() => {
            h.iter().any(|hv| hv == scalar)
        }
        (h, n) => h == n,
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMessageSource {
    messages: RwLock<Vec<Message>>,
}

impl InMemoryMessageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

#[async_trait]
impl MessageSource for InMemoryMessageSource {
    async fn find_message_by_query(
        &self,
        query: &Map<String, Value>,
    ) -> Result<Option<Message>, MessagingError> {
        let needle = Value::Object(query.clone());
        let messages = self.messages.read();
        Ok(messages
            .iter()
            .find(|m| json_contains(&m.parsed_payload(), &needle))
            .cloned())
    }

    async fn record_message(&self, message: &Message) -> Result<(), MessagingError> {
        let mut messages = self.messages.write();
        if !messages.iter().any(|m| m.id == message.id) {
            messages.push(message.clone());
        }
        Ok(())
    }
}

/// Messages persisted in the `event_message` table
#[derive(Debug, Clone)]
pub struct PgMessageSource {
    pool: PgPool,
}

impl PgMessageSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageSource for PgMessageSource {
    #[instrument(skip(self, query))]
    async fn find_message_by_query(
        &self,
        query: &Map<String, Value>,
    ) -> Result<Option<Message>, MessagingError> {
        let row = sqlx::query_as::<_, (String, String, Option<String>, DateTime<Utc>)>(
            r#"
            SELECT message_id, payload, trace_id, received_on
            FROM event_message
            WHERE payload_json @> $1
            ORDER BY received_on, message_id
            LIMIT 1
            "#,
        )
        .bind(Value::Object(query.clone()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MessagingError::database_query("find_message_by_query", e.to_string()))?;

        Ok(row.map(|(id, payload, trace_id, received)| {
            let mut message = Message::new(id, payload);
            message.trace_id = trace_id;
            message.received = received;
            message
        }))
    }

    async fn record_message(&self, message: &Message) -> Result<(), MessagingError> {
        let parsed = parse_payload(&message.payload);
        // raw-text payloads are kept but never match a containment query
        let payload_json = (!parsed.is_string()).then_some(parsed);

        let result = sqlx::query(
            r#"
            INSERT INTO event_message (message_id, payload, payload_json, trace_id, received_on)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (message_id) DO NOTHING
            "#,
        )
        .bind(&message.id)
        .bind(&message.payload)
        .bind(payload_json)
        .bind(&message.trace_id)
        .bind(message.received)
        .execute(&self.pool)
        .await
        .map_err(|e| MessagingError::database_query("record_message", e.to_string()))?;

        debug!(
            message_id = %message.id,
            inserted = result.rows_affected() == 1,
            "Recorded event message"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_contains() {
        let doc = json!({"orderId": "B", "lines": [1, 2, 3], "meta": {"region": "eu", "x": 1}});
        assert!(json_contains(&doc, &json!({"orderId": "B"})));
        assert!(json_contains(&doc, &json!({"meta": {"region": "eu"}})));
        assert!(json_contains(&doc, &json!({"lines": [3, 1]})));
        assert!(!json_contains(&doc, &json!({"orderId": "b"})));
        assert!(!json_contains(&doc, &json!({"missing": null})));
        assert!(json_contains(&doc, &json!({})));
    }

    #[tokio::test]
    async fn test_in_memory_source_returns_oldest_match() {
        let source = InMemoryMessageSource::new();
        source
            .record_message(&Message::new("m1", r#"{"orderId":"A"}"#))
            .await
            .unwrap();
        source
            .record_message(&Message::new("m2", r#"{"orderId":"B","seq":1}"#))
            .await
            .unwrap();
        source
            .record_message(&Message::new("m3", r#"{"orderId":"B","seq":2}"#))
            .await
            .unwrap();
        source.record_message(&Message::new("m4", "not json")).await.unwrap();

        let query = json!({"orderId": "B"}).as_object().cloned().unwrap();
        let found = source.find_message_by_query(&query).await.unwrap().unwrap();
        assert_eq!(found.id, "m2");

        let miss = json!({"orderId": "C"}).as_object().cloned().unwrap();
        assert!(source.find_message_by_query(&miss).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_is_idempotent_per_id() {
        let source = InMemoryMessageSource::new();
        let message = Message::new("m1", "{}");
        source.record_message(&message).await.unwrap();
        source.record_message(&message).await.unwrap();
        assert_eq!(source.len(), 1);
    }
}

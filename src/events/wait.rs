//! # Wait Task
//!
//! A WAIT task blocks until a recorded event message matches the correlation
//! query in its `event_wait` input. The orchestrator calls [`WaitTask::execute`]
//! once per poll; the call never blocks or loops internally.
//!
//! ```json
//! {
//!   "event_wait": {
//!     "query": {"type": "payment", "orderId": "o-17"},
//!     "update": {"status": ".result", "statuses": {"ok": "COMPLETED"}, "failedReason": ".error"}
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use super::resolution::{event_output, StatusMapping};
use crate::constants::EVENT_WAIT_INPUT_KEY;
use crate::error::{Result, TaskerError};
use crate::expression::ScriptEvaluator;
use crate::messaging::MessageSource;
use crate::models::{parse_payload, Task, TaskStatus};

/// The `event_wait` task input
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventWait {
    #[serde(default)]
    pub query: Map<String, Value>,
    #[serde(default)]
    pub update: WaitUpdate,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitUpdate {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub statuses: HashMap<String, String>,
    #[serde(default)]
    pub failed_reason: Option<String>,
}

impl WaitUpdate {
    fn mapping(&self) -> StatusMapping<'_> {
        StatusMapping::new(
            self.status.as_deref(),
            &self.statuses,
            self.failed_reason.as_deref(),
        )
    }
}

impl EventWait {
    /// Read the wait configuration from task input; `None` when absent.
    pub fn from_task(task: &Task) -> Result<Option<Self>> {
        match task.input_data.get(EVENT_WAIT_INPUT_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|e| TaskerError::validation(format!("invalid {EVENT_WAIT_INPUT_KEY}: {e}"))),
        }
    }
}

pub struct WaitTask {
    source: Arc<dyn MessageSource>,
    evaluator: Arc<ScriptEvaluator>,
}

impl WaitTask {
    pub fn new(source: Arc<dyn MessageSource>, evaluator: Arc<ScriptEvaluator>) -> Self {
        Self { source, evaluator }
    }

    /// Move the task IN_PROGRESS and try to resolve it straight away.
    pub async fn start(&self, task: &mut Task) -> Result<()> {
        if !self.execute(task).await? {
            task.set_status(TaskStatus::InProgress);
        }
        Ok(())
    }

    /// One poll. Returns `true` when a message resolved the task, `false` when
    /// it stays IN_PROGRESS. On error the task is left unchanged.
    #[instrument(skip(self, task), fields(task_id = %task.task_id))]
    pub async fn execute(&self, task: &mut Task) -> Result<bool> {
        let Some(wait) = EventWait::from_task(task)? else {
            debug!("No event_wait configuration; waiting");
            return Ok(false);
        };

        let Some(message) = self.source.find_message_by_query(&wait.query).await? else {
            return Ok(false);
        };

        let payload = parse_payload(&message.payload);
        let resolution = wait.update.mapping().resolve(&self.evaluator, &payload)?;

        task.output_data
            .extend(event_output(None, &payload, &message.id));
        if resolution.reason.is_some() {
            task.reason_for_incompletion = resolution.reason;
        }
        task.set_status(resolution.status);

        info!(
            message_id = %message.id,
            status = %resolution.status,
            "⏳ WAIT: resolved by event message"
        );
        Ok(true)
    }

    /// Cancellation always wins over any pending message.
    pub fn cancel(&self, task: &mut Task) {
        task.set_status(TaskStatus::Canceled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::output_keys;
    use crate::messaging::InMemoryMessageSource;
    use crate::models::Message;
    use serde_json::json;

    fn wait_task(wait: Value) -> Task {
        let mut input = Map::new();
        input.insert(EVENT_WAIT_INPUT_KEY.to_string(), wait);
        Task::new("wf-1", "wait_ref", "WAIT")
            .with_status(TaskStatus::InProgress)
            .with_input(input)
    }

    #[tokio::test]
    async fn test_missing_config_keeps_waiting() {
        let source = Arc::new(InMemoryMessageSource::new());
        let waiter = WaitTask::new(source, Arc::new(ScriptEvaluator::default()));
        let mut task = Task::new("wf-1", "wait_ref", "WAIT").with_status(TaskStatus::InProgress);
        assert!(!waiter.execute(&mut task).await.unwrap());
        assert_eq!(task.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_non_matching_message_keeps_waiting() {
        let source = Arc::new(InMemoryMessageSource::new());
        source
            .record_message(&Message::from_json(&json!({"orderId": "o-2"})))
            .await
            .unwrap();
        let waiter = WaitTask::new(source, Arc::new(ScriptEvaluator::default()));
        let mut task = wait_task(json!({"query": {"orderId": "o-1"}}));

        assert!(!waiter.execute(&mut task).await.unwrap());
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(!task.output_data.contains_key(output_keys::EVENT_PAYLOAD));
    }

    #[tokio::test]
    async fn test_failed_mapping_records_reason() {
        let source = Arc::new(InMemoryMessageSource::new());
        source
            .record_message(&Message::from_json(
                &json!({"orderId": "o-1", "result": "declined", "error": "card expired"}),
            ))
            .await
            .unwrap();
        let waiter = WaitTask::new(source, Arc::new(ScriptEvaluator::default()));
        let mut task = wait_task(json!({
            "query": {"orderId": "o-1"},
            "update": {"status": ".result", "statuses": {"declined": "FAILED"}, "failedReason": ".error"}
        }));

        assert!(waiter.execute(&mut task).await.unwrap());
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.reason_for_incompletion.as_deref(), Some("card expired"));
    }

    #[tokio::test]
    async fn test_cancel_is_unconditional() {
        let source = Arc::new(InMemoryMessageSource::new());
        source
            .record_message(&Message::from_json(&json!({"orderId": "o-1"})))
            .await
            .unwrap();
        let waiter = WaitTask::new(source, Arc::new(ScriptEvaluator::default()));
        let mut task = wait_task(json!({"query": {"orderId": "o-1"}}));
        waiter.cancel(&mut task);
        assert_eq!(task.status, TaskStatus::Canceled);
    }

    #[tokio::test]
    async fn test_start_marks_unresolved_in_progress() {
        let source = Arc::new(InMemoryMessageSource::new());
        let waiter = WaitTask::new(source, Arc::new(ScriptEvaluator::default()));
        let mut task = wait_task(json!({"query": {"orderId": "nope"}})).with_status(TaskStatus::Scheduled);
        waiter.start(&mut task).await.unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
    }
}

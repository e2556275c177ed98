//! # Execution Store Contract
//!
//! Transactional reads and writes over workflows, tasks, and event
//! executions, plus the admission unit of work used by the concurrency and
//! rate limit gates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{EventExecution, Task, Workflow};

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Insert tasks, skipping any whose (workflow, reference name + retry count)
    /// was already scheduled. Returns the tasks actually created.
    async fn create_tasks(&self, tasks: &[Task]) -> Result<Vec<Task>>;

    /// Persist a task and keep the admission ledger in step with its status:
    /// IN_PROGRESS marks the ledger row active, terminal states remove it.
    async fn update_task(&self, task: &Task) -> Result<()>;

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>>;

    /// Tasks of a workflow in scheduling order
    async fn tasks_for_workflow(&self, workflow_id: &str) -> Result<Vec<Task>>;

    async fn create_workflow(&self, workflow: &Workflow) -> Result<()>;

    async fn update_workflow(&self, workflow: &Workflow) -> Result<()>;

    async fn get_workflow(&self, workflow_id: &str, include_tasks: bool) -> Result<Option<Workflow>>;

    /// Non-terminal workflows of a type, with their tasks, in creation order
    async fn running_workflows(&self, workflow_type: &str) -> Result<Vec<Workflow>>;

    /// Conditional insert; false when the execution was already recorded
    async fn add_event_execution(&self, execution: &EventExecution) -> Result<bool>;

    async fn update_event_execution(&self, execution: &EventExecution) -> Result<()>;

    async fn event_executions(
        &self,
        handler_name: &str,
        event: &str,
        message_id: &str,
    ) -> Result<Vec<EventExecution>>;

    /// Open an admission unit of work serialized per task definition.
    async fn begin_admission(&self, task_def_name: &str) -> Result<Box<dyn AdmissionUnit>>;
}

/// Read-check-write sequence for one task definition.
///
/// Dropping the unit without `commit` discards its writes where the backend
/// supports it.
#[async_trait]
pub trait AdmissionUnit: Send {
    /// Ledger rows currently marked in progress
    async fn in_progress_count(&mut self) -> Result<i64>;

    /// First `limit` in-progress task ids by ledger insertion sequence
    async fn first_in_progress_ids(&mut self, limit: i64) -> Result<Vec<String>>;

    /// Remove buckets created before `cutoff`
    async fn purge_rate_buckets(&mut self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Buckets created within `[from, to]`
    async fn count_rate_buckets(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<i64>;

    async fn insert_rate_bucket(
        &mut self,
        created_on: DateTime<Utc>,
        expires_on: DateTime<Utc>,
    ) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

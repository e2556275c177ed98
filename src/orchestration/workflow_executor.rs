use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::database::ExecutionStore;
use crate::error::{Result, TaskerError};
use crate::models::{StartWorkflow, Task, TaskResult, Workflow};

/// Operations the event core needs from the workflow orchestrator
#[async_trait]
pub trait WorkflowExecutor: Send + Sync {
    /// Non-terminal workflows of a type, with their tasks
    async fn running_workflows(&self, workflow_type: &str) -> Result<Vec<Workflow>>;

    async fn get_workflow(&self, workflow_id: &str) -> Result<Option<Workflow>>;

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>>;

    /// Apply a task result; the orchestrator persists it and advances the
    /// workflow. Returns `false` when the task was already terminal and the
    /// result was dropped.
    async fn update_task(&self, result: TaskResult) -> Result<bool>;

    /// Start a workflow and return its id
    async fn start_workflow(&self, request: &StartWorkflow) -> Result<String>;
}

/// Executor that applies results directly to an [`ExecutionStore`].
///
/// Results for tasks that already reached a terminal state are ignored, so a
/// late resolution never overwrites a cancellation.
#[derive(Clone)]
pub struct StoreWorkflowExecutor {
    store: Arc<dyn ExecutionStore>,
}

impl StoreWorkflowExecutor {
    pub fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ExecutionStore> {
        &self.store
    }
}

#[async_trait]
impl WorkflowExecutor for StoreWorkflowExecutor {
    async fn running_workflows(&self, workflow_type: &str) -> Result<Vec<Workflow>> {
        self.store.running_workflows(workflow_type).await
    }

    async fn get_workflow(&self, workflow_id: &str) -> Result<Option<Workflow>> {
        self.store.get_workflow(workflow_id, true).await
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.store.get_task(task_id).await
    }

    #[instrument(skip(self, result), fields(task_id = %result.task_id, status = %result.status))]
    async fn update_task(&self, result: TaskResult) -> Result<bool> {
        let mut task = self
            .store
            .get_task(&result.task_id)
            .await?
            .ok_or_else(|| TaskerError::NotFound(format!("task {}", result.task_id)))?;

        if task.workflow_instance_id != result.workflow_instance_id {
            return Err(TaskerError::validation(format!(
                "task {} does not belong to workflow {}",
                result.task_id, result.workflow_instance_id
            )));
        }

        if task.status.is_terminal() {
            debug!(current = %task.status, "Task already terminal; ignoring stale result");
            return Ok(false);
        }

        if result.reset_start_time {
            task.start_time = Some(Utc::now());
        }
        task.output_data.extend(result.output_data);
        if result.reason_for_incompletion.is_some() {
            task.reason_for_incompletion = result.reason_for_incompletion;
        }
        task.set_status(result.status);
        self.store.update_task(&task).await?;
        Ok(true)
    }

    #[instrument(skip(self, request), fields(workflow_type = %request.name))]
    async fn start_workflow(&self, request: &StartWorkflow) -> Result<String> {
        if request.name.trim().is_empty() {
            return Err(TaskerError::validation("start_workflow name is empty"));
        }
        let mut workflow = Workflow::new(&request.name);
        if let Some(version) = request.version {
            workflow.version = version;
        }
        workflow.correlation_id = request.correlation_id.clone();
        workflow.input = request.input.clone();
        self.store.create_workflow(&workflow).await?;
        info!(workflow_id = %workflow.workflow_id, "🚀 WORKFLOW: started from event");
        Ok(workflow.workflow_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryExecutionStore;
    use crate::models::TaskStatus;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_task_merges_output_and_status() {
        let store = InMemoryExecutionStore::new();
        let task = Task::new("wf-1", "wait_ref", "WAIT").with_status(TaskStatus::InProgress);
        store.create_tasks(&[task.clone()]).await.unwrap();
        let executor = StoreWorkflowExecutor::new(Arc::new(store.clone()));

        let mut result = TaskResult::from(&task);
        result.status = TaskStatus::Completed;
        result.output_data.insert("k".into(), json!("v"));
        assert!(executor.update_task(result).await.unwrap());

        let stored = store.get_task(&task.task_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.output_data["k"], json!("v"));
        assert!(stored.end_time.is_some());
    }

    #[tokio::test]
    async fn test_terminal_task_is_not_overwritten() {
        let store = InMemoryExecutionStore::new();
        let task = Task::new("wf-1", "wait_ref", "WAIT").with_status(TaskStatus::Canceled);
        store.create_tasks(&[task.clone()]).await.unwrap();
        let executor = StoreWorkflowExecutor::new(Arc::new(store.clone()));

        let mut result = TaskResult::from(&task);
        result.status = TaskStatus::Completed;
        assert!(!executor.update_task(result).await.unwrap());

        let stored = store.get_task(&task.task_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Canceled);
    }

    #[tokio::test]
    async fn test_start_workflow_creates_running_instance() {
        let store = InMemoryExecutionStore::new();
        let executor = StoreWorkflowExecutor::new(Arc::new(store.clone()));
        let request = StartWorkflow {
            name: "refund_flow".into(),
            correlation_id: Some("order-9".into()),
            ..StartWorkflow::default()
        };
        let id = executor.start_workflow(&request).await.unwrap();
        let running = executor.running_workflows("refund_flow").await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].workflow_id, id);
        assert_eq!(running[0].correlation_id.as_deref(), Some("order-9"));
    }
}

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use super::AdmissionController;
use crate::error::Result;
use crate::models::Task;

impl AdmissionController {
    /// Whether running `task` would exceed its definition's concurrency limit.
    ///
    /// Below the limit the task is admitted outright. At or above it, the task
    /// is admitted only if it is among the first `limit` in-progress tasks of
    /// its definition by ledger insertion order.
    #[instrument(skip(self, task), fields(task_id = %task.task_id, task_def = %task.definition_name()))]
    pub async fn exceeds_in_progress_limit(&self, task: &Task) -> Result<bool> {
        let Some(limit) = self
            .task_defs
            .task_def(task.definition_name())
            .and_then(|def| def.effective_concurrency_limit())
        else {
            return Ok(false);
        };

        let mut unit = self.store.begin_admission(task.definition_name()).await?;
        let in_progress = unit.in_progress_count().await?;
        if in_progress < limit {
            unit.commit().await?;
            return Ok(false);
        }

        let window = unit.first_in_progress_ids(limit).await?;
        unit.commit().await?;

        let holds_slot = window.iter().any(|id| id == &task.task_id);
        if !holds_slot {
            debug!(
                in_progress = in_progress,
                limit = limit,
                "🚦 ADMISSION: concurrency limit reached"
            );
        }
        Ok(!holds_slot)
    }

    /// Rate limit check evaluated at an explicit instant.
    #[instrument(skip(self, task), fields(task_id = %task.task_id, task_def = %task.definition_name()))]
    pub async fn exceeds_rate_limit_per_frequency_at(
        &self,
        task: &Task,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.check_rate_limit(task, now).await
    }

    /// Rate limit check at the current time.
    pub async fn exceeds_rate_limit_per_frequency(&self, task: &Task) -> Result<bool> {
        self.exceeds_rate_limit_per_frequency_at(task, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::TaskDefRegistry;
    use crate::database::{ExecutionStore, InMemoryExecutionStore};
    use crate::models::{TaskDef, TaskStatus};
    use std::sync::Arc;

    fn controller(store: &InMemoryExecutionStore, limit: i32) -> AdmissionController {
        let defs = TaskDefRegistry::from_defs([TaskDef::new("HTTP").with_concurrency_limit(limit)]);
        AdmissionController::new(Arc::new(store.clone()), Arc::new(defs))
    }

    #[tokio::test]
    async fn test_unknown_definition_is_unlimited() {
        let store = InMemoryExecutionStore::new();
        let gate = controller(&store, 1);
        let task = Task::new("wf", "t", "SIMPLE").with_status(TaskStatus::InProgress);
        store.create_tasks(&[task.clone()]).await.unwrap();
        assert!(!gate.exceeds_in_progress_limit(&task).await.unwrap());
    }

    #[tokio::test]
    async fn test_fifo_window_admits_earliest() {
        let store = InMemoryExecutionStore::new();
        let gate = controller(&store, 1);
        let first = Task::new("wf", "a", "HTTP").with_status(TaskStatus::InProgress);
        let second = Task::new("wf", "b", "HTTP").with_status(TaskStatus::InProgress);
        store.create_tasks(&[first.clone(), second.clone()]).await.unwrap();

        assert!(!gate.exceeds_in_progress_limit(&first).await.unwrap());
        assert!(gate.exceeds_in_progress_limit(&second).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = InMemoryExecutionStore::new();
        let gate = controller(&store, 1);
        store.set_unavailable(true);
        let task = Task::new("wf", "a", "HTTP");
        assert!(gate
            .exceeds_in_progress_limit(&task)
            .await
            .unwrap_err()
            .is_store_failure());
    }
}

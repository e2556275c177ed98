//! # PostgreSQL Execution Store
//!
//! Workflows, tasks, and event executions are stored as JSON documents next
//! to the columns the queries filter on. Admission units run inside a
//! transaction that first takes a transaction-scoped advisory lock keyed on
//! the task definition name, so concurrent admission checks for the same
//! definition are serialized across processes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, instrument};

use super::store::{AdmissionUnit, ExecutionStore};
use crate::error::{Result, TaskerError};
use crate::models::{EventExecution, Task, TaskStatus, Workflow};

const TERMINAL_WORKFLOW_STATUSES: [&str; 4] = ["COMPLETED", "FAILED", "CANCELLED", "TIMED_OUT"];

fn db_error(operation: &str, err: sqlx::Error) -> TaskerError {
    error!(operation = operation, error = %err, "Execution store query failed");
    TaskerError::DatabaseError(format!("{operation}: {err}"))
}

#[derive(Debug, Clone)]
pub struct PostgresExecutionStore {
    pool: PgPool,
}

impl PostgresExecutionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn upsert_task(tx: &mut Transaction<'static, Postgres>, task: &Task) -> Result<()> {
        let json = serde_json::to_value(task)?;
        sqlx::query(
            "INSERT INTO task (task_id, workflow_id, json_data) VALUES ($1, $2, $3) \
             ON CONFLICT (task_id) DO UPDATE SET json_data = EXCLUDED.json_data, modified_on = now()",
        )
        .bind(&task.task_id)
        .bind(&task.workflow_instance_id)
        .bind(json)
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("upsert_task", e))?;
        Ok(())
    }

    async fn sync_ledger(tx: &mut Transaction<'static, Postgres>, task: &Task) -> Result<()> {
        if task.status.is_terminal() {
            sqlx::query("DELETE FROM task_in_progress WHERE task_def_name = $1 AND task_id = $2")
                .bind(task.definition_name())
                .bind(&task.task_id)
                .execute(&mut **tx)
                .await
                .map_err(|e| db_error("remove_task_in_progress", e))?;
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO task_in_progress (task_def_name, task_id, workflow_id, in_progress) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT ON CONSTRAINT task_in_progress_fields \
             DO UPDATE SET in_progress = EXCLUDED.in_progress, modified_on = now()",
        )
        .bind(task.definition_name())
        .bind(&task.task_id)
        .bind(&task.workflow_instance_id)
        .bind(task.status == TaskStatus::InProgress)
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("update_in_progress_status", e))?;
        Ok(())
    }

    async fn load_tasks(&self, workflow_id: &str) -> Result<Vec<Task>> {
        let docs: Vec<Value> = sqlx::query_scalar(
            "SELECT json_data FROM task WHERE workflow_id = $1 ORDER BY seq",
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("tasks_for_workflow", e))?;

        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(TaskerError::from))
            .collect()
    }

    async fn write_workflow(&self, workflow: &Workflow, insert: bool) -> Result<u64> {
        let mut doc = workflow.clone();
        doc.tasks = Vec::new();
        let json = serde_json::to_value(&doc)?;
        let sql = if insert {
            "INSERT INTO workflow (workflow_id, workflow_type, status, json_data) VALUES ($1, $2, $3, $4)"
        } else {
            "UPDATE workflow SET workflow_type = $2, status = $3, json_data = $4, modified_on = now() \
             WHERE workflow_id = $1"
        };
        let result = sqlx::query(sql)
            .bind(&workflow.workflow_id)
            .bind(&workflow.workflow_type)
            .bind(workflow.status.as_str())
            .bind(json)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("write_workflow", e))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ExecutionStore for PostgresExecutionStore {
    #[instrument(skip(self, tasks), fields(count = tasks.len()))]
    async fn create_tasks(&self, tasks: &[Task]) -> Result<Vec<Task>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin", e))?;
        let mut created = Vec::with_capacity(tasks.len());

        for task in tasks {
            let scheduled = sqlx::query(
                "INSERT INTO task_scheduled (workflow_id, task_key, task_id) VALUES ($1, $2, $3) \
                 ON CONFLICT (workflow_id, task_key) DO NOTHING",
            )
            .bind(&task.workflow_instance_id)
            .bind(task.scheduled_key())
            .bind(&task.task_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("add_scheduled_task", e))?;

            if scheduled.rows_affected() == 0 {
                debug!(
                    task_id = %task.task_id,
                    task_key = %task.scheduled_key(),
                    "Task already scheduled; skipping"
                );
                continue;
            }

            Self::upsert_task(&mut tx, task).await?;
            sqlx::query(
                "INSERT INTO task_in_progress (task_def_name, task_id, workflow_id, in_progress) \
                 VALUES ($1, $2, $3, $4) ON CONFLICT ON CONSTRAINT task_in_progress_fields DO NOTHING",
            )
            .bind(task.definition_name())
            .bind(&task.task_id)
            .bind(&task.workflow_instance_id)
            .bind(task.status == TaskStatus::InProgress)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("add_task_in_progress", e))?;
            created.push(task.clone());
        }

        tx.commit().await.map_err(|e| db_error("commit", e))?;
        Ok(created)
    }

    #[instrument(skip(self, task), fields(task_id = %task.task_id, status = %task.status))]
    async fn update_task(&self, task: &Task) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin", e))?;
        Self::upsert_task(&mut tx, task).await?;
        Self::sync_ledger(&mut tx, task).await?;
        tx.commit().await.map_err(|e| db_error("commit", e))?;
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        let doc: Option<Value> = sqlx::query_scalar("SELECT json_data FROM task WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("get_task", e))?;
        doc.map(|d| serde_json::from_value(d).map_err(TaskerError::from))
            .transpose()
    }

    async fn tasks_for_workflow(&self, workflow_id: &str) -> Result<Vec<Task>> {
        self.load_tasks(workflow_id).await
    }

    #[instrument(skip(self, workflow), fields(workflow_id = %workflow.workflow_id))]
    async fn create_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.write_workflow(workflow, true).await?;
        if !workflow.tasks.is_empty() {
            self.create_tasks(&workflow.tasks).await?;
        }
        Ok(())
    }

    async fn update_workflow(&self, workflow: &Workflow) -> Result<()> {
        if self.write_workflow(workflow, false).await? == 0 {
            return Err(TaskerError::NotFound(format!(
                "workflow {}",
                workflow.workflow_id
            )));
        }
        Ok(())
    }

    async fn get_workflow(&self, workflow_id: &str, include_tasks: bool) -> Result<Option<Workflow>> {
        let doc: Option<Value> =
            sqlx::query_scalar("SELECT json_data FROM workflow WHERE workflow_id = $1")
                .bind(workflow_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("get_workflow", e))?;

        let Some(doc) = doc else {
            return Ok(None);
        };
        let mut workflow: Workflow = serde_json::from_value(doc)?;
        if include_tasks {
            workflow.tasks = self.load_tasks(workflow_id).await?;
        }
        Ok(Some(workflow))
    }

    #[instrument(skip(self))]
    async fn running_workflows(&self, workflow_type: &str) -> Result<Vec<Workflow>> {
        let terminal: Vec<String> = TERMINAL_WORKFLOW_STATUSES
            .iter()
            .map(|s| s.to_string())
            .collect();
        let docs: Vec<Value> = sqlx::query_scalar(
            "SELECT json_data FROM workflow WHERE workflow_type = $1 AND status <> ALL($2) \
             ORDER BY created_on, workflow_id",
        )
        .bind(workflow_type)
        .bind(&terminal)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("running_workflows", e))?;

        let mut workflows = Vec::with_capacity(docs.len());
        for doc in docs {
            let mut workflow: Workflow = serde_json::from_value(doc)?;
            workflow.tasks = self.load_tasks(&workflow.workflow_id).await?;
            workflows.push(workflow);
        }
        Ok(workflows)
    }

    async fn add_event_execution(&self, execution: &EventExecution) -> Result<bool> {
        let json = serde_json::to_value(execution)?;
        let result = sqlx::query(
            "INSERT INTO event_execution (handler_name, event_name, message_id, execution_id, \
             status, subject, received_on, accepted_on, started_on, processed_on, json_data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT ON CONSTRAINT event_execution_fields DO NOTHING",
        )
        .bind(&execution.name)
        .bind(&execution.event)
        .bind(&execution.message_id)
        .bind(&execution.id)
        .bind(execution.status.as_str())
        .bind(&execution.subject)
        .bind(execution.received)
        .bind(execution.accepted)
        .bind(execution.started)
        .bind(execution.processed)
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("add_event_execution", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_event_execution(&self, execution: &EventExecution) -> Result<()> {
        let json = serde_json::to_value(execution)?;
        sqlx::query(
            "UPDATE event_execution SET status = $5, started_on = $6, processed_on = $7, json_data = $8 \
             WHERE handler_name = $1 AND event_name = $2 AND message_id = $3 AND execution_id = $4",
        )
        .bind(&execution.name)
        .bind(&execution.event)
        .bind(&execution.message_id)
        .bind(&execution.id)
        .bind(execution.status.as_str())
        .bind(execution.started)
        .bind(execution.processed)
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update_event_execution", e))?;
        Ok(())
    }

    async fn event_executions(
        &self,
        handler_name: &str,
        event: &str,
        message_id: &str,
    ) -> Result<Vec<EventExecution>> {
        let docs: Vec<Value> = sqlx::query_scalar(
            "SELECT json_data FROM event_execution \
             WHERE handler_name = $1 AND event_name = $2 AND message_id = $3 ORDER BY execution_id",
        )
        .bind(handler_name)
        .bind(event)
        .bind(message_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("event_executions", e))?;

        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(TaskerError::from))
            .collect()
    }

    async fn begin_admission(&self, task_def_name: &str) -> Result<Box<dyn AdmissionUnit>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin_admission", e))?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(task_def_name)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("admission_lock", e))?;
        Ok(Box::new(PgAdmissionUnit {
            tx,
            task_def_name: task_def_name.to_string(),
        }))
    }
}

struct PgAdmissionUnit {
    tx: Transaction<'static, Postgres>,
    task_def_name: String,
}

#[async_trait]
impl AdmissionUnit for PgAdmissionUnit {
    async fn in_progress_count(&mut self) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT count(*) FROM task_in_progress WHERE task_def_name = $1 AND in_progress = true",
        )
        .bind(&self.task_def_name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("in_progress_count", e))
    }

    async fn first_in_progress_ids(&mut self, limit: i64) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT task_id FROM task_in_progress WHERE task_def_name = $1 AND in_progress = true \
             ORDER BY id LIMIT $2",
        )
        .bind(&self.task_def_name)
        .bind(limit.max(0))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("first_in_progress_ids", e))
    }

    async fn purge_rate_buckets(&mut self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM task_rate_limit WHERE task_def_name = $1 AND created_on < $2")
                .bind(&self.task_def_name)
                .bind(cutoff)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| db_error("purge_rate_buckets", e))?;
        Ok(result.rows_affected())
    }

    async fn count_rate_buckets(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT count(*) FROM task_rate_limit \
             WHERE task_def_name = $1 AND created_on BETWEEN $2 AND $3",
        )
        .bind(&self.task_def_name)
        .bind(from)
        .bind(to)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("count_rate_buckets", e))
    }

    async fn insert_rate_bucket(
        &mut self,
        created_on: DateTime<Utc>,
        expires_on: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO task_rate_limit (created_on, expires_on, task_def_name) VALUES ($1, $2, $3)",
        )
        .bind(created_on)
        .bind(expires_on)
        .bind(&self.task_def_name)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("insert_rate_bucket", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| db_error("commit_admission", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::migrations;

    async fn test_store() -> Option<PostgresExecutionStore> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPool::connect(&url).await.ok()?;
        migrations::run(&pool).await.ok()?;
        Some(PostgresExecutionStore::new(pool))
    }

    #[tokio::test]
    async fn test_ledger_follows_task_status() {
        let Some(store) = test_store().await else {
            eprintln!("TEST_DATABASE_URL not set; skipping");
            return;
        };
        let def_name = format!("pg_ledger_{}", uuid::Uuid::new_v4());
        let mut task = Task::new("wf-pg", "t", "HTTP").with_task_def_name(&def_name);
        store.create_tasks(&[task.clone()]).await.unwrap();

        task.set_status(TaskStatus::InProgress);
        store.update_task(&task).await.unwrap();
        let mut unit = store.begin_admission(&def_name).await.unwrap();
        assert_eq!(unit.in_progress_count().await.unwrap(), 1);
        unit.commit().await.unwrap();

        task.set_status(TaskStatus::Completed);
        store.update_task(&task).await.unwrap();
        let mut unit = store.begin_admission(&def_name).await.unwrap();
        assert_eq!(unit.in_progress_count().await.unwrap(), 0);
        unit.commit().await.unwrap();
    }
}

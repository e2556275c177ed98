//! # In-Memory Execution Store
//!
//! Single-process store backed by one async mutex. An admission unit holds the
//! mutex guard for its whole lifetime, which serializes admission checks the
//! way the Postgres advisory lock does. Writes made through an admission unit
//! are applied immediately; dropping the unit does not roll them back.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::store::{AdmissionUnit, ExecutionStore};
use crate::error::{Result, TaskerError};
use crate::models::{EventExecution, Task, TaskStatus, Workflow};

#[derive(Debug, Clone)]
struct LedgerRow {
    seq: i64,
    task_def_name: String,
    task_id: String,
    in_progress: bool,
}

#[derive(Debug, Clone)]
struct RateBucket {
    task_def_name: String,
    created_on: DateTime<Utc>,
    #[allow(dead_code)]
    expires_on: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    workflow_order: Vec<String>,
    workflows: HashMap<String, Workflow>,
    task_order: Vec<String>,
    tasks: HashMap<String, Task>,
    scheduled: HashSet<(String, String)>,
    ledger: Vec<LedgerRow>,
    next_seq: i64,
    rate_buckets: Vec<RateBucket>,
    execution_order: Vec<(String, String, String, String)>,
    executions: HashMap<(String, String, String, String), EventExecution>,
}

impl MemoryState {
    fn add_ledger_row(&mut self, task: &Task) {
        let def_name = task.definition_name();
        if self
            .ledger
            .iter()
            .any(|r| r.task_def_name == def_name && r.task_id == task.task_id)
        {
            return;
        }
        self.next_seq += 1;
        self.ledger.push(LedgerRow {
            seq: self.next_seq,
            task_def_name: def_name.to_string(),
            task_id: task.task_id.clone(),
            in_progress: task.status == TaskStatus::InProgress,
        });
    }

    fn sync_ledger(&mut self, task: &Task) {
        let def_name = task.definition_name();
        if task.status.is_terminal() {
            self.ledger
                .retain(|r| !(r.task_def_name == def_name && r.task_id == task.task_id));
            return;
        }
        match self
            .ledger
            .iter_mut()
            .find(|r| r.task_def_name == def_name && r.task_id == task.task_id)
        {
            Some(row) => row.in_progress = task.status == TaskStatus::InProgress,
            None => self.add_ledger_row(task),
        }
    }

    fn insert_task(&mut self, task: &Task) -> bool {
        let key = (task.workflow_instance_id.clone(), task.scheduled_key());
        if !self.scheduled.insert(key) {
            return false;
        }
        if !self.tasks.contains_key(&task.task_id) {
            self.task_order.push(task.task_id.clone());
        }
        self.tasks.insert(task.task_id.clone(), task.clone());
        self.add_ledger_row(task);
        true
    }

    fn workflow_tasks(&self, workflow_id: &str) -> Vec<Task> {
        self.task_order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .filter(|t| t.workflow_instance_id == workflow_id)
            .cloned()
            .collect()
    }

    fn assemble(&self, workflow: &Workflow, include_tasks: bool) -> Workflow {
        let mut assembled = workflow.clone();
        assembled.tasks = if include_tasks {
            self.workflow_tasks(&workflow.workflow_id)
        } else {
            Vec::new()
        };
        assembled
    }
}

fn execution_key(execution: &EventExecution) -> (String, String, String, String) {
    (
        execution.name.clone(),
        execution.event.clone(),
        execution.message_id.clone(),
        execution.id.clone(),
    )
}

/// In-memory `ExecutionStore` for tests and embedded use
#[derive(Debug, Clone, Default)]
pub struct InMemoryExecutionStore {
    state: Arc<Mutex<MemoryState>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a database error until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(TaskerError::DatabaseError(
                "execution store unavailable".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Rate buckets currently stored for a task definition
    pub async fn rate_bucket_count(&self, task_def_name: &str) -> usize {
        let state = self.state.lock().await;
        state
            .rate_buckets
            .iter()
            .filter(|b| b.task_def_name == task_def_name)
            .count()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn create_tasks(&self, tasks: &[Task]) -> Result<Vec<Task>> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let mut created = Vec::with_capacity(tasks.len());
        for task in tasks {
            if state.insert_task(task) {
                created.push(task.clone());
            } else {
                debug!(
                    task_id = %task.task_id,
                    workflow_id = %task.workflow_instance_id,
                    task_key = %task.scheduled_key(),
                    "Task already scheduled; skipping"
                );
            }
        }
        Ok(created)
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        if !state.tasks.contains_key(&task.task_id) {
            state.task_order.push(task.task_id.clone());
        }
        state.tasks.insert(task.task_id.clone(), task.clone());
        state.sync_ledger(task);
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state.tasks.get(task_id).cloned())
    }

    async fn tasks_for_workflow(&self, workflow_id: &str) -> Result<Vec<Task>> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state.workflow_tasks(workflow_id))
    }

    async fn create_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        if state.workflows.contains_key(&workflow.workflow_id) {
            return Err(TaskerError::validation(format!(
                "workflow {} already exists",
                workflow.workflow_id
            )));
        }
        state.workflow_order.push(workflow.workflow_id.clone());
        let mut stored = workflow.clone();
        stored.tasks = Vec::new();
        state.workflows.insert(workflow.workflow_id.clone(), stored);
        for task in &workflow.tasks {
            state.insert_task(task);
        }
        Ok(())
    }

    async fn update_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        if !state.workflows.contains_key(&workflow.workflow_id) {
            return Err(TaskerError::NotFound(format!(
                "workflow {}",
                workflow.workflow_id
            )));
        }
        let mut stored = workflow.clone();
        stored.tasks = Vec::new();
        state.workflows.insert(workflow.workflow_id.clone(), stored);
        Ok(())
    }

    async fn get_workflow(&self, workflow_id: &str, include_tasks: bool) -> Result<Option<Workflow>> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state
            .workflows
            .get(workflow_id)
            .map(|w| state.assemble(w, include_tasks)))
    }

    async fn running_workflows(&self, workflow_type: &str) -> Result<Vec<Workflow>> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state
            .workflow_order
            .iter()
            .filter_map(|id| state.workflows.get(id))
            .filter(|w| w.workflow_type == workflow_type && !w.status.is_terminal())
            .map(|w| state.assemble(w, true))
            .collect())
    }

    async fn add_event_execution(&self, execution: &EventExecution) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let key = execution_key(execution);
        if state.executions.contains_key(&key) {
            return Ok(false);
        }
        state.execution_order.push(key.clone());
        state.executions.insert(key, execution.clone());
        Ok(true)
    }

    async fn update_event_execution(&self, execution: &EventExecution) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let key = execution_key(execution);
        if !state.executions.contains_key(&key) {
            state.execution_order.push(key.clone());
        }
        state.executions.insert(key, execution.clone());
        Ok(())
    }

    async fn event_executions(
        &self,
        handler_name: &str,
        event: &str,
        message_id: &str,
    ) -> Result<Vec<EventExecution>> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state
            .execution_order
            .iter()
            .filter(|(h, e, m, _)| h == handler_name && e == event && m == message_id)
            .filter_map(|key| state.executions.get(key))
            .cloned()
            .collect())
    }

    async fn begin_admission(&self, task_def_name: &str) -> Result<Box<dyn AdmissionUnit>> {
        self.check_available()?;
        let guard = Arc::clone(&self.state).lock_owned().await;
        Ok(Box::new(InMemoryAdmissionUnit {
            guard,
            task_def_name: task_def_name.to_string(),
            unavailable: Arc::clone(&self.unavailable),
        }))
    }
}

struct InMemoryAdmissionUnit {
    guard: OwnedMutexGuard<MemoryState>,
    task_def_name: String,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryAdmissionUnit {
    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(TaskerError::DatabaseError(
                "execution store unavailable".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AdmissionUnit for InMemoryAdmissionUnit {
    async fn in_progress_count(&mut self) -> Result<i64> {
        self.check_available()?;
        let count = self
            .guard
            .ledger
            .iter()
            .filter(|r| r.task_def_name == self.task_def_name && r.in_progress)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn first_in_progress_ids(&mut self, limit: i64) -> Result<Vec<String>> {
        self.check_available()?;
        let mut rows: Vec<&LedgerRow> = self
            .guard
            .ledger
            .iter()
            .filter(|r| r.task_def_name == self.task_def_name && r.in_progress)
            .collect();
        rows.sort_by_key(|r| r.seq);
        let take = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(rows.into_iter().take(take).map(|r| r.task_id.clone()).collect())
    }

    async fn purge_rate_buckets(&mut self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.check_available()?;
        let def_name = self.task_def_name.clone();
        let buckets = &mut self.guard.rate_buckets;
        let before = buckets.len();
        buckets.retain(|b| !(b.task_def_name == def_name && b.created_on < cutoff));
        Ok((before - buckets.len()) as u64)
    }

    async fn count_rate_buckets(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<i64> {
        self.check_available()?;
        let count = self
            .guard
            .rate_buckets
            .iter()
            .filter(|b| {
                b.task_def_name == self.task_def_name && b.created_on >= from && b.created_on <= to
            })
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn insert_rate_bucket(
        &mut self,
        created_on: DateTime<Utc>,
        expires_on: DateTime<Utc>,
    ) -> Result<()> {
        self.check_available()?;
        let task_def_name = self.task_def_name.clone();
        self.guard.rate_buckets.push(RateBucket {
            task_def_name,
            created_on,
            expires_on,
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.check_available()
    }
}

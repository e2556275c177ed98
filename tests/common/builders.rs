//! Builders and harnesses shared by the integration tests.

#![allow(dead_code)]

use serde_json::{Map, Value};
use std::sync::Arc;
use tasker_events::database::{ExecutionStore, InMemoryExecutionStore};
use tasker_events::events::{ActionRegistry, NamedHandlerRegistry};
use tasker_events::expression::ScriptEvaluator;
use tasker_events::models::{Task, TaskStatus, Workflow};
use tasker_events::orchestration::StoreWorkflowExecutor;

/// In-memory collaborators wired the way a deployment wires the real ones
pub struct EventHarness {
    pub store: InMemoryExecutionStore,
    pub evaluator: Arc<ScriptEvaluator>,
    pub executor: Arc<StoreWorkflowExecutor>,
    pub named: Arc<NamedHandlerRegistry>,
    pub registry: Arc<ActionRegistry>,
}

impl EventHarness {
    pub fn new() -> Self {
        let store = InMemoryExecutionStore::new();
        let evaluator = Arc::new(ScriptEvaluator::default());
        let executor = Arc::new(StoreWorkflowExecutor::new(Arc::new(store.clone())));
        let named = Arc::new(NamedHandlerRegistry::new());
        let registry = Arc::new(ActionRegistry::standard(
            executor.clone(),
            evaluator.clone(),
            named.clone(),
        ));
        Self {
            store,
            evaluator,
            executor,
            named,
            registry,
        }
    }

    pub fn store_handle(&self) -> Arc<dyn ExecutionStore> {
        Arc::new(self.store.clone())
    }

    pub async fn task(&self, task_id: &str) -> Task {
        self.store
            .get_task(task_id)
            .await
            .expect("store read")
            .expect("task exists")
    }
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Builder for a workflow with IN_PROGRESS tasks
pub struct WorkflowBuilder {
    workflow: Workflow,
}

impl WorkflowBuilder {
    pub fn new(workflow_type: &str) -> Self {
        Self {
            workflow: Workflow::new(workflow_type),
        }
    }

    pub fn with_status(mut self, status: tasker_events::models::WorkflowStatus) -> Self {
        self.workflow.status = status;
        self
    }

    pub fn with_wait_task(self, reference_name: &str, input: Value) -> Self {
        self.with_task(reference_name, "WAIT", TaskStatus::InProgress, input)
    }

    pub fn with_task(
        mut self,
        reference_name: &str,
        task_type: &str,
        status: TaskStatus,
        input: Value,
    ) -> Self {
        let task = Task::new(&self.workflow.workflow_id, reference_name, task_type)
            .with_status(status)
            .with_input(object(input));
        self.workflow.tasks.push(task);
        self
    }

    pub async fn create(self, store: &InMemoryExecutionStore) -> Workflow {
        store
            .create_workflow(&self.workflow)
            .await
            .expect("Failed to create test workflow");
        self.workflow
    }
}

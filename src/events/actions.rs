//! # Action Dispatch
//!
//! One handler per [`ActionKind`], looked up through an [`ActionRegistry`].
//! Handlers return an output map that is recorded on the event execution.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::debug;

use super::context::EventContext;
use super::find_update::FindUpdateAction;
use super::task_actions::{StartWorkflowAction, TaskDetailsAction, UpdateTaskAction};
use crate::error::{Result, TaskerError};
use crate::expression::ScriptEvaluator;
use crate::models::{Action, ActionKind};
use crate::orchestration::WorkflowExecutor;

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(
        &self,
        action: &Action,
        payload: &Value,
        ctx: &EventContext,
    ) -> Result<Map<String, Value>>;
}

/// User-supplied handler invoked by `java_action`, looked up by name
#[async_trait]
pub trait NamedHandler: Send + Sync {
    async fn handle(
        &self,
        input: &Map<String, Value>,
        payload: &Value,
        ctx: &EventContext,
    ) -> Result<Map<String, Value>>;
}

#[derive(Default)]
pub struct NamedHandlerRegistry {
    handlers: DashMap<String, Arc<dyn NamedHandler>>,
}

impl NamedHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn NamedHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn NamedHandler>> {
        self.handlers.get(name).map(|h| Arc::clone(h.value()))
    }
}

/// `java_action`: invoke a registered [`NamedHandler`]
pub struct NamedHandlerAction {
    handlers: Arc<NamedHandlerRegistry>,
}

impl NamedHandlerAction {
    pub fn new(handlers: Arc<NamedHandlerRegistry>) -> Self {
        Self { handlers }
    }
}

#[async_trait]
impl ActionHandler for NamedHandlerAction {
    async fn execute(
        &self,
        action: &Action,
        payload: &Value,
        ctx: &EventContext,
    ) -> Result<Map<String, Value>> {
        let request = action.java_action_payload()?;
        let handler = self.handlers.get(&request.class_name).ok_or_else(|| {
            TaskerError::UnsupportedAction(format!("java_action handler '{}'", request.class_name))
        })?;
        handler.handle(&request.input_parameters, payload, ctx).await
    }
}

#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a handler for every action kind.
    pub fn standard(
        executor: Arc<dyn WorkflowExecutor>,
        evaluator: Arc<ScriptEvaluator>,
        named: Arc<NamedHandlerRegistry>,
    ) -> Self {
        let task_details = Arc::new(TaskDetailsAction::new(
            Arc::clone(&executor),
            Arc::clone(&evaluator),
        ));
        let mut registry = Self::new();
        registry
            .register(
                ActionKind::FindUpdate,
                Arc::new(FindUpdateAction::new(
                    Arc::clone(&executor),
                    Arc::clone(&evaluator),
                )),
            )
            .register(
                ActionKind::UpdateTask,
                Arc::new(UpdateTaskAction::new(
                    Arc::clone(&executor),
                    Arc::clone(&evaluator),
                )),
            )
            .register(ActionKind::CompleteTask, task_details.clone())
            .register(ActionKind::FailTask, task_details)
            .register(
                ActionKind::StartWorkflow,
                Arc::new(StartWorkflowAction::new(executor, evaluator)),
            )
            .register(ActionKind::JavaAction, Arc::new(NamedHandlerAction::new(named)));
        registry
    }

    pub fn register(&mut self, kind: ActionKind, handler: Arc<dyn ActionHandler>) -> &mut Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn supports(&self, kind: ActionKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub async fn execute(
        &self,
        action: &Action,
        payload: &Value,
        ctx: &EventContext,
    ) -> Result<Map<String, Value>> {
        let handler = self
            .handlers
            .get(&action.action)
            .ok_or_else(|| TaskerError::unsupported(action.action))?;
        debug!(action = %action.action, message_id = %ctx.message_id, "Dispatching action");
        handler.execute(action, payload, ctx).await
    }
}

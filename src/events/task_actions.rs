//! Direct task and workflow actions: `update_task`, `complete_task`,
//! `fail_task`, and `start_workflow`.
//!
//! Identifier and input fields may be literals or JSONPath expressions
//! (`$.…` or jq-style `.…`) evaluated against the event payload.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use super::actions::ActionHandler;
use super::context::EventContext;
use super::resolution::{event_output, StatusMapping};
use crate::constants::execution_keys;
use crate::error::{Result, TaskerError};
use crate::expression::ScriptEvaluator;
use crate::models::{Action, ActionKind, Task, TaskResult, TaskStatus};
use crate::orchestration::WorkflowExecutor;

fn is_expression(raw: &str) -> bool {
    raw.starts_with('$') || raw.starts_with('.')
}

/// A literal, or the required result of evaluating it against the payload.
fn resolve_field(evaluator: &ScriptEvaluator, raw: &str, payload: &Value) -> Result<String> {
    if is_expression(raw) {
        Ok(evaluator.eval_text_required(raw, payload)?)
    } else {
        Ok(raw.to_string())
    }
}

fn resolve_optional(
    evaluator: &ScriptEvaluator,
    raw: Option<&str>,
    payload: &Value,
) -> Result<Option<String>> {
    raw.filter(|r| !r.trim().is_empty())
        .map(|r| resolve_field(evaluator, r, payload))
        .transpose()
}

/// Find the target by task id, or by workflow id and reference name.
async fn locate_task(
    executor: &dyn WorkflowExecutor,
    task_id: Option<String>,
    workflow_id: Option<String>,
    task_ref: Option<String>,
) -> Result<Task> {
    if let Some(task_id) = task_id {
        return executor
            .get_task(&task_id)
            .await?
            .ok_or_else(|| TaskerError::NotFound(format!("task {task_id}")));
    }

    match (workflow_id, task_ref) {
        (Some(workflow_id), Some(task_ref)) => {
            let workflow = executor
                .get_workflow(&workflow_id)
                .await?
                .ok_or_else(|| TaskerError::NotFound(format!("workflow {workflow_id}")))?;
            workflow.task_by_ref_name(&task_ref).cloned().ok_or_else(|| {
                TaskerError::NotFound(format!("task {task_ref} in workflow {workflow_id}"))
            })
        }
        _ => Err(TaskerError::validation(
            "a task id or a workflow id with a task reference name is required",
        )),
    }
}

fn updated_output(task: &Task) -> Map<String, Value> {
    let mut output = Map::new();
    output.insert(
        execution_keys::WORKFLOW_ID.to_string(),
        Value::String(task.workflow_instance_id.clone()),
    );
    output.insert(
        execution_keys::UPDATED_TASKS.to_string(),
        Value::Array(vec![Value::String(task.task_id.clone())]),
    );
    output
}

pub struct UpdateTaskAction {
    executor: Arc<dyn WorkflowExecutor>,
    evaluator: Arc<ScriptEvaluator>,
}

impl UpdateTaskAction {
    pub fn new(executor: Arc<dyn WorkflowExecutor>, evaluator: Arc<ScriptEvaluator>) -> Self {
        Self { executor, evaluator }
    }
}

#[async_trait]
impl ActionHandler for UpdateTaskAction {
    async fn execute(
        &self,
        action: &Action,
        payload: &Value,
        ctx: &EventContext,
    ) -> Result<Map<String, Value>> {
        let request = action.update_task_payload()?;
        let evaluator = self.evaluator.as_ref();

        let task_id = resolve_optional(evaluator, request.task_id.as_deref(), payload)?;
        let workflow_id = resolve_optional(evaluator, request.workflow_id.as_deref(), payload)?;
        let task_ref = resolve_optional(evaluator, request.task_ref.as_deref(), payload)?;

        let resolution = StatusMapping::new(
            request.status.as_deref(),
            &request.statuses,
            request.failed_reason.as_deref(),
        )
        .resolve(evaluator, payload)?;

        let task = locate_task(self.executor.as_ref(), task_id, workflow_id, task_ref).await?;

        let mut result = TaskResult::from(&task);
        result.status = resolution.status;
        result.reason_for_incompletion = resolution.reason;
        result.reset_start_time = request.reset_start_time;
        result.output_data.extend(request.output.clone());
        result
            .output_data
            .extend(event_output(Some(&ctx.event), payload, &ctx.message_id));

        let applied = self.executor.update_task(result).await?;
        info!(task_id = %task.task_id, status = %resolution.status, applied, "📝 UPDATE_TASK: handled");
        Ok(updated_output(&task))
    }
}

/// `complete_task` and `fail_task`
pub struct TaskDetailsAction {
    executor: Arc<dyn WorkflowExecutor>,
    evaluator: Arc<ScriptEvaluator>,
}

impl TaskDetailsAction {
    pub fn new(executor: Arc<dyn WorkflowExecutor>, evaluator: Arc<ScriptEvaluator>) -> Self {
        Self { executor, evaluator }
    }
}

#[async_trait]
impl ActionHandler for TaskDetailsAction {
    async fn execute(
        &self,
        action: &Action,
        payload: &Value,
        ctx: &EventContext,
    ) -> Result<Map<String, Value>> {
        let status = match action.action {
            ActionKind::CompleteTask => TaskStatus::Completed,
            ActionKind::FailTask => TaskStatus::Failed,
            other => return Err(TaskerError::unsupported(other)),
        };
        let details = action.task_details_payload()?;
        let evaluator = self.evaluator.as_ref();

        let task = locate_task(
            self.executor.as_ref(),
            resolve_optional(evaluator, details.task_id.as_deref(), payload)?,
            resolve_optional(evaluator, details.workflow_id.as_deref(), payload)?,
            resolve_optional(evaluator, details.task_ref_name.as_deref(), payload)?,
        )
        .await?;

        let mut result = TaskResult::from(&task);
        result.status = status;
        result.output_data.extend(details.output.clone());
        result
            .output_data
            .extend(event_output(Some(&ctx.event), payload, &ctx.message_id));

        let applied = self.executor.update_task(result).await?;
        info!(task_id = %task.task_id, status = %status, applied, "📝 TASK_DETAILS: handled");
        Ok(updated_output(&task))
    }
}

pub struct StartWorkflowAction {
    executor: Arc<dyn WorkflowExecutor>,
    evaluator: Arc<ScriptEvaluator>,
}

impl StartWorkflowAction {
    pub fn new(executor: Arc<dyn WorkflowExecutor>, evaluator: Arc<ScriptEvaluator>) -> Self {
        Self { executor, evaluator }
    }

    fn expand_input(&self, input: &Map<String, Value>, payload: &Value) -> Result<Map<String, Value>> {
        let mut expanded = Map::with_capacity(input.len());
        for (key, value) in input {
            let resolved = match value {
                Value::String(raw) if is_expression(raw) => self
                    .evaluator
                    .eval_text(raw, payload)?
                    .map(Value::String)
                    .unwrap_or(Value::Null),
                other => other.clone(),
            };
            expanded.insert(key.clone(), resolved);
        }
        Ok(expanded)
    }
}

#[async_trait]
impl ActionHandler for StartWorkflowAction {
    async fn execute(
        &self,
        action: &Action,
        payload: &Value,
        ctx: &EventContext,
    ) -> Result<Map<String, Value>> {
        let mut request = action.start_workflow_payload()?.clone();
        request.input = self.expand_input(&request.input, payload)?;
        request.correlation_id =
            resolve_optional(&self.evaluator, request.correlation_id.as_deref(), payload)?;
        request
            .input
            .extend(event_output(Some(&ctx.event), payload, &ctx.message_id));

        let workflow_id = self.executor.start_workflow(&request).await?;
        let mut output = Map::new();
        output.insert(execution_keys::WORKFLOW_ID.to_string(), Value::String(workflow_id));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_and_expression_fields() {
        let evaluator = ScriptEvaluator::default();
        let payload = serde_json::json!({"task": {"id": "t-9"}});
        assert_eq!(resolve_field(&evaluator, "t-1", &payload).unwrap(), "t-1");
        assert_eq!(resolve_field(&evaluator, ".task.id", &payload).unwrap(), "t-9");
        assert!(resolve_field(&evaluator, "$.missing", &payload).is_err());
        assert_eq!(resolve_optional(&evaluator, Some("  "), &payload).unwrap(), None);
    }
}

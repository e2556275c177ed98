//! # find_update
//!
//! Broadcast resolution: an event names a workflow type and a set of task
//! input fields to correlate on. Every IN_PROGRESS wait task of a running
//! workflow of that type whose input matches the values derived from the
//! payload is resolved with the same status.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::actions::ActionHandler;
use super::context::EventContext;
use super::resolution::{event_output, StatusMapping};
use crate::constants::execution_keys;
use crate::error::{Result, TaskerError};
use crate::expression::ScriptEvaluator;
use crate::models::{Action, FindUpdate, Task, TaskResult};
use crate::orchestration::WorkflowExecutor;

pub struct FindUpdateAction {
    executor: Arc<dyn WorkflowExecutor>,
    evaluator: Arc<ScriptEvaluator>,
}

fn input_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Every expected key is present in the task input and equal ignoring case.
fn matches_input(task: &Task, expected: &BTreeMap<String, String>) -> bool {
    if task.input_data.is_empty() {
        return false;
    }
    expected.iter().all(|(key, value)| {
        task.input_data
            .get(key)
            .is_some_and(|actual| input_text(actual).to_lowercase() == value.to_lowercase())
    })
}

impl FindUpdateAction {
    pub fn new(executor: Arc<dyn WorkflowExecutor>, evaluator: Arc<ScriptEvaluator>) -> Self {
        Self { executor, evaluator }
    }

    /// Expected task input values derived once from the payload.
    fn expected_values(
        &self,
        request: &FindUpdate,
        payload: &Value,
    ) -> Result<BTreeMap<String, String>> {
        let mut expected = BTreeMap::new();
        for (key, expression) in &request.input_parameters {
            if expression.trim().is_empty() {
                return Err(TaskerError::validation(format!(
                    "find_update expression for '{key}' is empty"
                )));
            }
            let value = self.evaluator.eval_text_required(expression, payload)?;
            expected.insert(key.clone(), value);
        }
        Ok(expected)
    }

    /// Resolve matching tasks and return the ids of those updated.
    #[instrument(skip_all, fields(workflow = %request.workflow_name, message_id = %ctx.message_id, trace_id = %ctx.trace_id))]
    pub async fn find_and_update(
        &self,
        request: &FindUpdate,
        payload: &Value,
        ctx: &EventContext,
    ) -> Result<Vec<String>> {
        if request.workflow_name.trim().is_empty() {
            return Err(TaskerError::validation("find_update workflowName is empty"));
        }
        if request.input_parameters.is_empty() {
            return Err(TaskerError::validation(
                "find_update inputParameters is empty",
            ));
        }

        let expected = self.expected_values(request, payload)?;
        let mapping = StatusMapping::new(
            request.status.as_deref(),
            &request.statuses,
            request.failed_reason.as_deref(),
        );
        let resolution = mapping.resolve(&self.evaluator, payload)?;

        let workflows = self.executor.running_workflows(&request.workflow_name).await?;
        let mut updated = Vec::new();

        for workflow in workflows {
            if workflow.status.is_terminal() {
                continue;
            }
            for task in &workflow.tasks {
                if !task.is_awaiting_event() {
                    continue;
                }
                if !request.task_ref_names.is_empty()
                    && !request.task_ref_names.contains(&task.reference_task_name)
                {
                    continue;
                }
                if !matches_input(task, &expected) {
                    continue;
                }

                let mut result = TaskResult::from(task);
                result.status = resolution.status;
                result
                    .output_data
                    .extend(event_output(Some(&ctx.event), payload, &ctx.message_id));
                if resolution.reason.is_some() {
                    result.reason_for_incompletion = resolution.reason.clone();
                }

                match self.executor.update_task(result).await {
                    Ok(false) => debug!(
                        workflow_id = %workflow.workflow_id,
                        task_id = %task.task_id,
                        "find_update skipped task that turned terminal"
                    ),
                    Ok(true) => {
                        debug!(
                            workflow_id = %workflow.workflow_id,
                            task_id = %task.task_id,
                            status = %resolution.status,
                            "find_update resolved task"
                        );
                        updated.push(task.task_id.clone());
                    }
                    Err(e) => warn!(
                        workflow_id = %workflow.workflow_id,
                        task_id = %task.task_id,
                        error = %e,
                        "find_update failed to update task; continuing"
                    ),
                }
            }
        }

        info!(updated = updated.len(), "🔎 FIND_UPDATE: completed");
        Ok(updated)
    }
}

#[async_trait]
impl ActionHandler for FindUpdateAction {
    async fn execute(
        &self,
        action: &Action,
        payload: &Value,
        ctx: &EventContext,
    ) -> Result<Map<String, Value>> {
        let request = action.find_update_payload()?;
        let updated = self.find_and_update(request, payload, ctx).await?;
        let mut output = Map::new();
        output.insert(
            execution_keys::UPDATED_TASKS.to_string(),
            Value::Array(updated.into_iter().map(Value::String).collect()),
        );
        Ok(output)
    }
}

//! # Status Resolution
//!
//! Shared by the Wait task poll, `find_update`, and `update_task`: derive a
//! task status from an event payload and, for failures, an incompletion
//! reason.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::constants::output_keys;
use crate::error::{Result, TaskerError};
use crate::expression::ScriptEvaluator;
use crate::models::TaskStatus;

/// How an event payload maps onto a task status.
#[derive(Debug, Clone, Copy)]
pub struct StatusMapping<'a> {
    /// Expression producing the status text; absent means COMPLETED
    pub status: Option<&'a str>,
    /// Remap from evaluated text to a task status name
    pub statuses: &'a HashMap<String, String>,
    /// Expression producing the reason when the status resolves to FAILED
    pub failed_reason: Option<&'a str>,
}

/// Outcome of applying a [`StatusMapping`] to one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: TaskStatus,
    pub reason: Option<String>,
}

fn non_empty(expr: Option<&str>) -> Option<&str> {
    expr.filter(|e| !e.trim().is_empty())
}

impl<'a> StatusMapping<'a> {
    pub fn new(
        status: Option<&'a str>,
        statuses: &'a HashMap<String, String>,
        failed_reason: Option<&'a str>,
    ) -> Self {
        Self {
            status,
            statuses,
            failed_reason,
        }
    }

    pub fn resolve_status(&self, evaluator: &ScriptEvaluator, payload: &Value) -> Result<TaskStatus> {
        let Some(expression) = non_empty(self.status) else {
            return Ok(TaskStatus::Completed);
        };

        let evaluated = evaluator.eval_text_required(expression, payload)?;
        let status_name = if self.statuses.is_empty() {
            evaluated.as_str()
        } else {
            self.statuses.get(&evaluated).map(String::as_str).ok_or_else(|| {
                TaskerError::validation(format!(
                    "no status mapping for '{evaluated}' from expression '{expression}'"
                ))
            })?
        };

        status_name
            .parse::<TaskStatus>()
            .map_err(TaskerError::validation)
    }

    /// Reason text for a FAILED outcome; `None` for other statuses.
    pub fn failure_reason(
        &self,
        evaluator: &ScriptEvaluator,
        status: TaskStatus,
        payload: &Value,
    ) -> Result<Option<String>> {
        match non_empty(self.failed_reason) {
            Some(expression) if status == TaskStatus::Failed => {
                Ok(evaluator.eval_text(expression, payload)?)
            }
            _ => Ok(None),
        }
    }

    pub fn resolve(&self, evaluator: &ScriptEvaluator, payload: &Value) -> Result<Resolution> {
        let status = self.resolve_status(evaluator, payload)?;
        let reason = self.failure_reason(evaluator, status, payload)?;
        Ok(Resolution { status, reason })
    }
}

/// Event metadata written into a resolved task's output.
pub fn event_output(event: Option<&str>, payload: &Value, message_id: &str) -> Map<String, Value> {
    let mut output = Map::new();
    if let Some(event) = event {
        output.insert(output_keys::EVENT_NAME.to_string(), Value::String(event.to_string()));
    }
    output.insert(output_keys::EVENT_PAYLOAD.to_string(), payload.clone());
    output.insert(
        output_keys::EVENT_MESSAGE_ID.to_string(),
        Value::String(message_id.to_string()),
    );
    output
}

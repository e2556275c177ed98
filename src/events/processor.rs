//! # Event Processor
//!
//! Runs an event handler's actions against one incoming message and keeps
//! an [`EventExecution`] record per action. Executions are inserted
//! conditionally, so a redelivered message does not run an action twice.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn, Instrument};

use super::actions::ActionRegistry;
use super::context::EventContext;
use crate::constants::execution_keys;
use crate::database::ExecutionStore;
use crate::error::Result;
use crate::expression::ScriptEvaluator;
use crate::logging::log_event_operation;
use crate::models::{EventExecution, EventExecutionStatus, EventHandler, Message};
use crate::retry::RetryQueueManager;
use crate::validation::{validate_event_handler, validate_event_payload};

/// Parse string values that hold JSON objects or arrays, recursively.
pub fn expand_inline_json(value: Value) -> Value {
    match value {
        Value::String(text) => {
            let trimmed = text.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                match serde_json::from_str::<Value>(&text) {
                    Ok(parsed) => expand_inline_json(parsed),
                    Err(_) => Value::String(text),
                }
            } else {
                Value::String(text)
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(expand_inline_json).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, expand_inline_json(v)))
                .collect(),
        ),
        other => other,
    }
}

pub struct EventProcessor {
    store: Arc<dyn ExecutionStore>,
    registry: Arc<ActionRegistry>,
    evaluator: Arc<ScriptEvaluator>,
    retry_queue: Option<Arc<RetryQueueManager>>,
}

impl EventProcessor {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        registry: Arc<ActionRegistry>,
        evaluator: Arc<ScriptEvaluator>,
    ) -> Self {
        Self {
            store,
            registry,
            evaluator,
            retry_queue: None,
        }
    }

    pub fn with_retry_queue(mut self, retry_queue: Arc<RetryQueueManager>) -> Self {
        self.retry_queue = Some(retry_queue);
        self
    }

    /// Run every matching handler against the message.
    pub async fn dispatch(
        &self,
        event: &str,
        message: &Message,
        handlers: &[EventHandler],
    ) -> Result<Vec<EventExecution>> {
        let mut executions = Vec::new();
        for handler in handlers {
            executions.extend(self.handle(handler, event, message).await?);
        }
        Ok(executions)
    }

    /// Run one handler's actions. Returns the executions recorded for this
    /// delivery; executions already recorded by an earlier delivery are skipped.
    pub async fn handle(
        &self,
        handler: &EventHandler,
        event: &str,
        message: &Message,
    ) -> Result<Vec<EventExecution>> {
        if !handler.active || handler.event != event {
            return Ok(Vec::new());
        }

        validate_event_handler(handler)?;
        let ctx = EventContext::from_message(event, message);
        let span = ctx.span();
        self.run_handler(handler, message, &ctx).instrument(span).await
    }

    async fn run_handler(
        &self,
        handler: &EventHandler,
        message: &Message,
        ctx: &EventContext,
    ) -> Result<Vec<EventExecution>> {
        let payload = message.parsed_payload();
        validate_event_payload(&payload)?;
        let accepted = message.accepted.unwrap_or_else(Utc::now);

        let handler_matches = match handler.condition.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(condition) => self.evaluator.eval_bool(condition, &payload)?,
            None => true,
        };

        let tags = self.tags_for(handler, &payload);
        let mut executions = Vec::with_capacity(handler.actions.len());

        for (index, action) in handler.actions.iter().enumerate() {
            let mut execution =
                EventExecution::new(&message.id, index, &handler.name, &ctx.event, action.action);
            execution.received = message.received;
            execution.accepted = Some(accepted);
            execution.tags = tags.clone();

            if !self.store.add_event_execution(&execution).await? {
                debug!(execution_id = %execution.id, "Execution already recorded; skipping");
                continue;
            }

            let action_condition = action.condition.as_deref().filter(|c| !c.trim().is_empty());
            let action_matches = match (handler_matches, action_condition) {
                (false, _) => Ok(false),
                (true, None) => Ok(true),
                (true, Some(condition)) => self.evaluator.eval_bool(condition, &payload),
            };
            let action_matches = match action_matches {
                Ok(matches) => matches,
                Err(e) => {
                    warn!(execution_id = %execution.id, error = %e, "Action condition failed");
                    execution
                        .output
                        .insert(execution_keys::EXCEPTION.to_string(), Value::String(e.to_string()));
                    execution.finish(EventExecutionStatus::Failed);
                    self.store.update_event_execution(&execution).await?;
                    executions.push(execution);
                    continue;
                }
            };

            if !action_matches {
                execution.finish(EventExecutionStatus::Skipped);
                self.store.update_event_execution(&execution).await?;
                executions.push(execution);
                continue;
            }

            let action_payload = if action.expand_inline_json {
                expand_inline_json(payload.clone())
            } else {
                payload.clone()
            };

            execution.mark_started();
            let queue = self.retry_queue.as_ref().filter(|q| {
                handler.retry_enabled && q.is_enabled() && RetryQueueManager::supports(action.action)
            });
            let status = match queue {
                Some(queue) => match queue.enqueue(action, &action_payload, &ctx.event, &message.id).await {
                    Ok(_) => {
                        execution
                            .output
                            .insert(execution_keys::RETRY_QUEUED.to_string(), Value::Bool(true));
                        EventExecutionStatus::Completed
                    }
                    Err(e) => {
                        execution
                            .output
                            .insert(execution_keys::EXCEPTION.to_string(), Value::String(e.to_string()));
                        EventExecutionStatus::Failed
                    }
                },
                None => match self.registry.execute(action, &action_payload, ctx).await {
                    Ok(output) => {
                        execution.output.extend(output);
                        EventExecutionStatus::Completed
                    }
                    Err(e) => {
                        warn!(execution_id = %execution.id, error = %e, "Action failed");
                        execution
                            .output
                            .insert(execution_keys::EXCEPTION.to_string(), Value::String(e.to_string()));
                        EventExecutionStatus::Failed
                    }
                },
            };

            execution.finish(status);
            self.store.update_event_execution(&execution).await?;
            log_event_operation(
                &handler.name,
                &ctx.event,
                &message.id,
                action.action.as_str(),
                status.as_str(),
            );
            executions.push(execution);
        }

        if !handler_matches {
            info!(handler = %handler.name, "Handler condition not met; actions skipped");
        }
        Ok(executions)
    }

    fn tags_for(&self, handler: &EventHandler, payload: &Value) -> std::collections::BTreeSet<String> {
        let Some(expression) = handler.tags.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Default::default();
        };
        match self.evaluator.eval_text(expression, payload) {
            Ok(Some(text)) => text
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
            Ok(None) => Default::default(),
            Err(e) => {
                warn!(handler = %handler.name, error = %e, "Tag expression failed");
                Default::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expand_inline_json_nested() {
        let payload = json!({
            "body": "{\"orderId\": \"A\", \"items\": \"[1, 2]\"}",
            "note": "plain {not json",
            "count": 3
        });
        let expanded = expand_inline_json(payload);
        assert_eq!(expanded["body"]["orderId"], json!("A"));
        assert_eq!(expanded["body"]["items"], json!([1, 2]));
        assert_eq!(expanded["note"], json!("plain {not json"));
        assert_eq!(expanded["count"], json!(3));
    }
}

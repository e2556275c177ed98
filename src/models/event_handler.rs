//! # Event Handler Model
//!
//! Static matching and action configuration loaded from the metadata store.
//! An `EventHandler` listens on one event identifier, gates on an optional
//! condition, and runs its ordered `Action`s against every accepted message.
//!
//! `Action` is a tagged variant: the `action` discriminant names which single
//! payload object is populated.

use crate::error::{Result, TaskerError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHandler {
    pub name: String,
    /// Event identifier, e.g. `sqs:orders`
    pub event: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub active: bool,
    /// JSONPath evaluated against the payload; comma separated result becomes the tag set
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub retry_enabled: bool,
}

impl EventHandler {
    pub fn new(name: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            event: event.into(),
            condition: None,
            actions: Vec::new(),
            active: true,
            tags: None,
            retry_enabled: false,
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_retry_enabled(mut self, enabled: bool) -> Self {
        self.retry_enabled = enabled;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    StartWorkflow,
    CompleteTask,
    FailTask,
    UpdateTask,
    FindUpdate,
    JavaAction,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartWorkflow => "start_workflow",
            Self::CompleteTask => "complete_task",
            Self::FailTask => "fail_task",
            Self::UpdateTask => "update_task",
            Self::FindUpdate => "find_update",
            Self::JavaAction => "java_action",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub action: ActionKind,
    #[serde(default, rename = "start_workflow", skip_serializing_if = "Option::is_none")]
    pub start_workflow: Option<StartWorkflow>,
    #[serde(default, rename = "complete_task", skip_serializing_if = "Option::is_none")]
    pub complete_task: Option<TaskDetails>,
    #[serde(default, rename = "fail_task", skip_serializing_if = "Option::is_none")]
    pub fail_task: Option<TaskDetails>,
    #[serde(default, rename = "update_task", skip_serializing_if = "Option::is_none")]
    pub update_task: Option<UpdateTask>,
    #[serde(default, rename = "find_update", skip_serializing_if = "Option::is_none")]
    pub find_update: Option<FindUpdate>,
    #[serde(default, rename = "java_action", skip_serializing_if = "Option::is_none")]
    pub java_action: Option<JavaAction>,
    /// Number of additional deliveries after a successful run from the retry queue
    #[serde(default)]
    pub retry_count: i32,
    #[serde(default)]
    pub retry_delay_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, rename = "expandInlineJSON")]
    pub expand_inline_json: bool,
}

impl Action {
    fn empty(action: ActionKind) -> Self {
        Self {
            action,
            start_workflow: None,
            complete_task: None,
            fail_task: None,
            update_task: None,
            find_update: None,
            java_action: None,
            retry_count: 0,
            retry_delay_seconds: 0,
            condition: None,
            expand_inline_json: false,
        }
    }

    pub fn find_update(payload: FindUpdate) -> Self {
        Self {
            find_update: Some(payload),
            ..Self::empty(ActionKind::FindUpdate)
        }
    }

    pub fn update_task(payload: UpdateTask) -> Self {
        Self {
            update_task: Some(payload),
            ..Self::empty(ActionKind::UpdateTask)
        }
    }

    pub fn complete_task(payload: TaskDetails) -> Self {
        Self {
            complete_task: Some(payload),
            ..Self::empty(ActionKind::CompleteTask)
        }
    }

    pub fn fail_task(payload: TaskDetails) -> Self {
        Self {
            fail_task: Some(payload),
            ..Self::empty(ActionKind::FailTask)
        }
    }

    pub fn start_workflow(payload: StartWorkflow) -> Self {
        Self {
            start_workflow: Some(payload),
            ..Self::empty(ActionKind::StartWorkflow)
        }
    }

    pub fn java_action(payload: JavaAction) -> Self {
        Self {
            java_action: Some(payload),
            ..Self::empty(ActionKind::JavaAction)
        }
    }

    pub fn with_retry(mut self, retry_count: i32, retry_delay_seconds: u64) -> Self {
        self.retry_count = retry_count;
        self.retry_delay_seconds = retry_delay_seconds;
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn find_update_payload(&self) -> Result<&FindUpdate> {
        self.find_update
            .as_ref()
            .ok_or_else(|| missing_payload(ActionKind::FindUpdate))
    }

    pub fn update_task_payload(&self) -> Result<&UpdateTask> {
        self.update_task
            .as_ref()
            .ok_or_else(|| missing_payload(ActionKind::UpdateTask))
    }

    /// Task details for `complete_task` or `fail_task`, whichever the discriminant names.
    pub fn task_details_payload(&self) -> Result<&TaskDetails> {
        let details = match self.action {
            ActionKind::CompleteTask => self.complete_task.as_ref(),
            ActionKind::FailTask => self.fail_task.as_ref(),
            other => {
                return Err(TaskerError::validation(format!(
                    "{other} action does not carry task details"
                )))
            }
        };
        details.ok_or_else(|| missing_payload(self.action))
    }

    pub fn start_workflow_payload(&self) -> Result<&StartWorkflow> {
        self.start_workflow
            .as_ref()
            .ok_or_else(|| missing_payload(ActionKind::StartWorkflow))
    }

    pub fn java_action_payload(&self) -> Result<&JavaAction> {
        self.java_action
            .as_ref()
            .ok_or_else(|| missing_payload(ActionKind::JavaAction))
    }
}

fn missing_payload(kind: ActionKind) -> TaskerError {
    TaskerError::validation(format!("{kind} payload is missing"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkflow {
    pub name: String,
    #[serde(default)]
    pub version: Option<i32>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default)]
    pub task_to_domain: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub task_ref_name: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub output: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub task_ref: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub failed_reason: Option<String>,
    #[serde(default)]
    pub reset_start_time: bool,
    #[serde(default)]
    pub statuses: HashMap<String, String>,
    #[serde(default)]
    pub output: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindUpdate {
    #[serde(default)]
    pub workflow_name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub failed_reason: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
    /// Restricts matching to these reference names when non-empty
    #[serde(default)]
    pub task_ref_names: BTreeSet<String>,
    #[serde(default)]
    pub statuses: HashMap<String, String>,
    /// Task input key → expression evaluated against the event payload
    #[serde(default)]
    pub input_parameters: BTreeMap<String, String>,
}

impl FindUpdate {
    pub fn new(workflow_name: impl Into<String>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            ..Self::default()
        }
    }

    pub fn with_input_parameter(
        mut self,
        key: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        self.input_parameters.insert(key.into(), expression.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_status_mapping(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.statuses.insert(from.into(), to.into());
        self
    }

    pub fn with_failed_reason(mut self, expression: impl Into<String>) -> Self {
        self.failed_reason = Some(expression.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaAction {
    #[serde(alias = "handlerName")]
    pub class_name: String,
    #[serde(default)]
    pub input_parameters: Map<String, Value>,
}

//! # Task Model
//!
//! A unit of work inside a workflow. Tasks are created by the orchestrator at
//! schedule time; this crate mutates them only while they sit IN_PROGRESS
//! waiting on an external event.

use crate::constants::is_wait_capable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Task lifecycle status as exchanged with the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Scheduled,
    InProgress,
    Completed,
    Failed,
    FailedNoRetry,
    Canceled,
    Reset,
}

impl TaskStatus {
    /// Terminal states are final; RESET is the only way back.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::FailedNoRetry | Self::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::FailedNoRetry => "FAILED_NO_RETRY",
            Self::Canceled => "CANCELED",
            Self::Reset => "RESET",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" => Ok(Self::Scheduled),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "FAILED_NO_RETRY" => Ok(Self::FailedNoRetry),
            "CANCELED" => Ok(Self::Canceled),
            "RESET" => Ok(Self::Reset),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: String,
    pub workflow_instance_id: String,
    pub reference_task_name: String,
    pub task_type: String,
    /// Task definition name; falls back to the task type when unset
    #[serde(default)]
    pub task_def_name: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub retry_count: i32,
    #[serde(default)]
    pub input_data: Map<String, Value>,
    #[serde(default)]
    pub output_data: Map<String, Value>,
    #[serde(default)]
    pub reason_for_incompletion: Option<String>,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a freshly scheduled task with a random id.
    pub fn new(
        workflow_instance_id: impl Into<String>,
        reference_task_name: impl Into<String>,
        task_type: impl Into<String>,
    ) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            workflow_instance_id: workflow_instance_id.into(),
            reference_task_name: reference_task_name.into(),
            task_type: task_type.into(),
            task_def_name: None,
            status: TaskStatus::Scheduled,
            retry_count: 0,
            input_data: Map::new(),
            output_data: Map::new(),
            reason_for_incompletion: None,
            scheduled_time: Some(Utc::now()),
            start_time: None,
            end_time: None,
            update_time: None,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_input(mut self, input: Map<String, Value>) -> Self {
        self.input_data = input;
        self
    }

    pub fn with_task_def_name(mut self, name: impl Into<String>) -> Self {
        self.task_def_name = Some(name.into());
        self
    }

    /// Name used to look up admission limits.
    pub fn definition_name(&self) -> &str {
        self.task_def_name.as_deref().unwrap_or(&self.task_type)
    }

    /// Scheduling dedupe key: one row per reference name and retry attempt.
    pub fn scheduled_key(&self) -> String {
        format!("{}{}", self.reference_task_name, self.retry_count)
    }

    /// Only IN_PROGRESS wait-capable tasks may be resolved by an event.
    pub fn is_awaiting_event(&self) -> bool {
        self.status == TaskStatus::InProgress && is_wait_capable(&self.task_type)
    }

    /// Apply a status, stamping the end time when it is terminal.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        let now = Utc::now();
        if status.is_terminal() {
            self.end_time = Some(now);
        }
        self.update_time = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_ignores_case() {
        assert_eq!("completed".parse::<TaskStatus>(), Ok(TaskStatus::Completed));
        assert_eq!(
            "Failed_No_Retry".parse::<TaskStatus>(),
            Ok(TaskStatus::FailedNoRetry)
        );
        assert!("DONE".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Canceled.is_terminal());
        assert!(TaskStatus::FailedNoRetry.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(!TaskStatus::Reset.is_terminal());
    }

    #[test]
    fn test_awaiting_event_requires_wait_type_in_progress() {
        let task = Task::new("wf-1", "wait_ref", "wait").with_status(TaskStatus::InProgress);
        assert!(task.is_awaiting_event());

        let scheduled = Task::new("wf-1", "wait_ref", "WAIT");
        assert!(!scheduled.is_awaiting_event());

        let http = Task::new("wf-1", "http_ref", "HTTP").with_status(TaskStatus::InProgress);
        assert!(!http.is_awaiting_event());
    }

    #[test]
    fn test_json_uses_camel_case() {
        let task = Task::new("wf-1", "wait_ref", "WAIT").with_status(TaskStatus::InProgress);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["workflowInstanceId"], "wf-1");
        assert_eq!(json["status"], "IN_PROGRESS");
    }
}

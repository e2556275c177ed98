//! # Workflow Model
//!
//! Workflow instances are created and terminated by the orchestrator. The event
//! core only reads non-terminal workflows and the tasks they own.

use super::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
    Reset,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::TimedOut => "TIMED_OUT",
            Self::Reset => "RESET",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => Ok(Self::Running),
            "PAUSED" => Ok(Self::Paused),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            "TIMED_OUT" => Ok(Self::TimedOut),
            "RESET" => Ok(Self::Reset),
            _ => Err(format!("Invalid workflow status: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub workflow_id: String,
    pub workflow_type: String,
    #[serde(default = "default_version")]
    pub version: i32,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub input: serde_json::Map<String, serde_json::Value>,
    /// Tasks in scheduling order
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

fn default_version() -> i32 {
    1
}

impl Workflow {
    /// A new RUNNING workflow with no tasks.
    pub fn new(workflow_type: impl Into<String>) -> Self {
        Self {
            workflow_id: Uuid::new_v4().to_string(),
            workflow_type: workflow_type.into(),
            version: default_version(),
            status: WorkflowStatus::Running,
            tags: BTreeSet::new(),
            correlation_id: None,
            input: serde_json::Map::new(),
            tasks: Vec::new(),
            create_time: Some(Utc::now()),
            end_time: None,
        }
    }

    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn task_by_ref_name(&self, reference_task_name: &str) -> Option<&Task> {
        self.tasks
            .iter()
            .rev()
            .find(|t| t.reference_task_name == reference_task_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;

    #[test]
    fn test_terminal_states() {
        assert!(WorkflowStatus::TimedOut.is_terminal());
        assert!(WorkflowStatus::Cancelled.is_terminal());
        assert!(!WorkflowStatus::Paused.is_terminal());
        assert!(!WorkflowStatus::Reset.is_terminal());
    }

    #[test]
    fn test_task_by_ref_name_returns_latest_attempt() {
        let mut workflow = Workflow::new("order_flow");
        let first = Task::new(&workflow.workflow_id, "wait_ref", "WAIT")
            .with_status(TaskStatus::Failed);
        let mut retry = Task::new(&workflow.workflow_id, "wait_ref", "WAIT")
            .with_status(TaskStatus::InProgress);
        retry.retry_count = 1;
        let retry_id = retry.task_id.clone();
        workflow.tasks = vec![first, retry];

        let found = workflow.task_by_ref_name("wait_ref").unwrap();
        assert_eq!(found.task_id, retry_id);
    }
}

//! Task state submitted back to the orchestrator.

use super::task::{Task, TaskStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub workflow_instance_id: String,
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub output_data: Map<String, Value>,
    #[serde(default)]
    pub reason_for_incompletion: Option<String>,
    #[serde(default)]
    pub reset_start_time: bool,
}

impl TaskResult {
    pub fn new(workflow_instance_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            workflow_instance_id: workflow_instance_id.into(),
            task_id: task_id.into(),
            status: TaskStatus::InProgress,
            output_data: Map::new(),
            reason_for_incompletion: None,
            reset_start_time: false,
        }
    }
}

impl From<&Task> for TaskResult {
    fn from(task: &Task) -> Self {
        Self {
            workflow_instance_id: task.workflow_instance_id.clone(),
            task_id: task.task_id.clone(),
            status: task.status,
            output_data: task.output_data.clone(),
            reason_for_incompletion: task.reason_for_incompletion.clone(),
            reset_start_time: false,
        }
    }
}

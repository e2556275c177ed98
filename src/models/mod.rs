//! # Data Models
//!
//! Tasks and workflows owned by the orchestrator, event handler configuration,
//! and the bookkeeping records the event core writes.

pub mod event_execution;
pub mod event_handler;
pub mod message;
pub mod task;
pub mod task_def;
pub mod task_result;
pub mod workflow;

pub use event_execution::{EventExecution, EventExecutionStatus};
pub use event_handler::{
    Action, ActionKind, EventHandler, FindUpdate, JavaAction, StartWorkflow, TaskDetails,
    UpdateTask,
};
pub use message::{parse_payload, Message};
pub use task::{Task, TaskStatus};
pub use task_def::TaskDef;
pub use task_result::TaskResult;
pub use workflow::{Workflow, WorkflowStatus};

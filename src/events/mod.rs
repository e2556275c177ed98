//! # Event Handling
//!
//! Event-driven task resolution: the Wait task poll, action handlers
//! (`find_update`, `update_task`, `complete_task`/`fail_task`,
//! `start_workflow`, named handlers), and the processor that runs an event
//! handler's actions against incoming messages.

pub mod actions;
pub mod context;
pub mod find_update;
pub mod processor;
pub mod resolution;
pub mod task_actions;
pub mod wait;

pub use actions::{ActionHandler, ActionRegistry, NamedHandler, NamedHandlerAction, NamedHandlerRegistry};
pub use context::EventContext;
pub use find_update::FindUpdateAction;
pub use processor::{expand_inline_json, EventProcessor};
pub use resolution::{Resolution, StatusMapping};
pub use task_actions::{StartWorkflowAction, TaskDetailsAction, UpdateTaskAction};
pub use wait::{EventWait, WaitTask, WaitUpdate};

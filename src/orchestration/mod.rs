//! # Orchestrator Seam
//!
//! The workflow decider lives outside this crate. Event handling talks to it
//! through [`WorkflowExecutor`]; [`StoreWorkflowExecutor`] is a store-backed
//! implementation used for embedded deployments and tests.

pub mod workflow_executor;

pub use workflow_executor::{StoreWorkflowExecutor, WorkflowExecutor};

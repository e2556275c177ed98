//! # Admission Control
//!
//! Concurrency and rate limit gates consulted before a task may run. Both
//! gates are read-check-write sequences that run inside one store
//! [`AdmissionUnit`](crate::database::AdmissionUnit), and both fail closed:
//! a store failure is returned to the caller instead of being treated as
//! "allowed" or "denied".

mod concurrency;
mod rate_limit;
pub mod task_defs;

use std::sync::Arc;

use crate::database::ExecutionStore;

pub use task_defs::{TaskDefLookup, TaskDefRegistry};

/// Gatekeeper combining the task definition lookup with the execution store.
#[derive(Clone)]
pub struct AdmissionController {
    store: Arc<dyn ExecutionStore>,
    task_defs: Arc<dyn TaskDefLookup>,
}

impl AdmissionController {
    pub fn new(store: Arc<dyn ExecutionStore>, task_defs: Arc<dyn TaskDefLookup>) -> Self {
        Self { store, task_defs }
    }

    pub fn task_defs(&self) -> &Arc<dyn TaskDefLookup> {
        &self.task_defs
    }
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController").finish_non_exhaustive()
    }
}

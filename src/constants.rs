//! # System Constants
//!
//! Wire-level names and defaults shared by the resolution engine, the
//! admission controller, and the retry queue.

/// Task type name of the wait-capable system task
pub const WAIT_TASK_TYPE: &str = "WAIT";

/// Input key holding the wait task's correlation and update mapping
pub const EVENT_WAIT_INPUT_KEY: &str = "event_wait";

/// Task output keys written when an event resolves a task
pub mod output_keys {
    pub const EVENT_NAME: &str = "conductor.event.name";
    pub const EVENT_PAYLOAD: &str = "conductor.event.payload";
    pub const EVENT_MESSAGE_ID: &str = "conductor.event.messageId";
}

/// Event execution output keys
pub mod execution_keys {
    pub const EXCEPTION: &str = "exception";
    pub const RETRY_QUEUED: &str = "retryQueued";
    pub const UPDATED_TASKS: &str = "updatedTasks";
    pub const WORKFLOW_ID: &str = "workflowId";
}

/// Defaults for the retry queue
pub mod retry_defaults {
    pub const QUEUE_NAME: &str = "conductor_event_retry";
    pub const THREAD_COUNT: usize = 2;
    pub const VISIBILITY_TIMEOUT_SECONDS: u64 = 60;
    pub const INITIAL_DELAY_MS: u64 = 60;
    pub const POLL_INTERVAL_MS: u64 = 1_000;
}

/// Defaults for the expression caches
pub mod expression_defaults {
    pub const CACHE_MAX_CAPACITY: u64 = 1_000;
    pub const CACHE_TTL_SECONDS: u64 = 3_600;
    pub const SCRIPT_INPUT_BINDING: &str = "input";
}

/// Whether a task type resolves through external events
pub fn is_wait_capable(task_type: &str) -> bool {
    task_type.eq_ignore_ascii_case(WAIT_TASK_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_capable_is_case_insensitive() {
        assert!(is_wait_capable("WAIT"));
        assert!(is_wait_capable("wait"));
        assert!(!is_wait_capable("HTTP"));
    }
}

//! # Event Core Configuration
//!
//! Settings for the store connection, the retry queue, the expression caches,
//! and the per-task-type admission limits.
//!
//! Values are layered with the `config` crate: `config/tasker-events.yaml`,
//! then `config/<environment>.yaml`, then `TASKER_EVENTS__*` environment
//! variables (double underscore between path segments).
//!
//! ```rust,no_run
//! use tasker_events::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let retry = &manager.config().retry_queue;
//! println!("retry queue {} enabled={}", retry.qualified_queue_name(), retry.enabled);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{expression_defaults, retry_defaults};
use crate::models::TaskDef;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration for the event core
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub database: DatabaseConfig,
    pub retry_queue: RetryQueueConfig,
    pub expression: ExpressionConfig,
    /// Admission limits per task type
    pub task_defs: Vec<TaskDef>,
}

impl EventsConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.retry_queue.validate()?;

        if self.expression.cache_max_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "expression.cache_max_capacity",
                "0",
                "cache capacity must be positive",
            ));
        }

        let mut seen = HashSet::new();
        for def in &self.task_defs {
            if def.name.trim().is_empty() {
                return Err(ConfigurationError::validation_error(
                    "task_defs entry has an empty name",
                ));
            }
            if !seen.insert(def.name.as_str()) {
                return Err(ConfigurationError::validation_error(format!(
                    "duplicate task definition '{}'",
                    def.name
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryQueueConfig {
    pub enabled: bool,
    pub queue_name: String,
    /// Deployment stack appended to the queue name
    pub stack: Option<String>,
    pub thread_count: usize,
    pub visibility_timeout_seconds: u64,
    pub initial_delay_ms: u64,
    pub poll_interval_ms: u64,
    /// Broker connection; the retry queue stays disabled without it
    pub connection_url: Option<String>,
}

impl Default for RetryQueueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            queue_name: retry_defaults::QUEUE_NAME.to_string(),
            stack: None,
            thread_count: retry_defaults::THREAD_COUNT,
            visibility_timeout_seconds: retry_defaults::VISIBILITY_TIMEOUT_SECONDS,
            initial_delay_ms: retry_defaults::INITIAL_DELAY_MS,
            poll_interval_ms: retry_defaults::POLL_INTERVAL_MS,
            connection_url: None,
        }
    }
}

impl RetryQueueConfig {
    /// `<queue_name>_<stack>` when a stack is configured.
    pub fn qualified_queue_name(&self) -> String {
        match self.stack.as_deref().map(str::trim) {
            Some(stack) if !stack.is_empty() => format!("{}_{}", self.queue_name, stack),
            _ => self.queue_name.clone(),
        }
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_seconds)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue_name.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "retry_queue.queue_name",
                "",
                "queue name must not be empty",
            ));
        }
        if self.thread_count == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry_queue.thread_count",
                "0",
                "worker pool needs at least one worker",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry_queue.poll_interval_ms",
                "0",
                "poll interval must be positive",
            ));
        }
        if self.visibility_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry_queue.visibility_timeout_seconds",
                "0",
                "visibility timeout must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionConfig {
    pub cache_max_capacity: u64,
    pub cache_ttl_seconds: u64,
}

impl Default for ExpressionConfig {
    fn default() -> Self {
        Self {
            cache_max_capacity: expression_defaults::CACHE_MAX_CAPACITY,
            cache_ttl_seconds: expression_defaults::CACHE_TTL_SECONDS,
        }
    }
}

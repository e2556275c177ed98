#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Events
//!
//! Event-driven task resolution and admission control for a workflow engine.
//!
//! ## Overview
//!
//! - **Wait tasks** block until a recorded event message matches their
//!   correlation query, then resolve with a status derived from the payload.
//! - **find_update** broadcasts one event to every waiting task of a workflow
//!   type whose input matches values extracted from the payload.
//! - **Admission control** gates task execution on per-definition concurrency
//!   (FIFO admission window) and sliding-window rate limits.
//! - **Retry queue** gives side-effecting event actions at-least-once,
//!   bounded delivery over a durable queue with lease-based redelivery.
//!
//! ## Module Organization
//!
//! - [`expression`] - JSONPath queries and rhai predicates with cached compilation
//! - [`admission`] - concurrency and rate limit gates
//! - [`events`] - Wait task, action handlers, and the event processor
//! - [`retry`] - durable retry queue manager
//! - [`messaging`] - durable queue providers and event message sources
//! - [`database`] - execution store contract with PostgreSQL and in-memory backends
//! - [`orchestration`] - seam to the workflow orchestrator
//! - [`models`] - tasks, workflows, handlers, actions, and execution records
//! - [`config`] - layered configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tasker_events::database::InMemoryExecutionStore;
//! use tasker_events::events::{ActionRegistry, EventProcessor, NamedHandlerRegistry};
//! use tasker_events::expression::ScriptEvaluator;
//! use tasker_events::models::{Action, EventHandler, FindUpdate, Message};
//! use tasker_events::orchestration::StoreWorkflowExecutor;
//!
//! # async fn example() -> tasker_events::Result<()> {
//! let store = Arc::new(InMemoryExecutionStore::new());
//! let evaluator = Arc::new(ScriptEvaluator::default());
//! let executor = Arc::new(StoreWorkflowExecutor::new(store.clone()));
//! let registry = Arc::new(ActionRegistry::standard(
//!     executor,
//!     evaluator.clone(),
//!     Arc::new(NamedHandlerRegistry::new()),
//! ));
//! let processor = EventProcessor::new(store, registry, evaluator);
//!
//! let handler = EventHandler::new("payments", "sqs:payments").with_action(Action::find_update(
//!     FindUpdate::new("order_flow").with_input_parameter("orderId", ".orderId"),
//! ));
//! let message = Message::from_json(&serde_json::json!({"orderId": "A-1"}));
//! processor.handle(&handler, "sqs:payments", &message).await?;
//! # Ok(())
//! # }
//! ```

pub mod admission;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod events;
pub mod expression;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod retry;
pub mod validation;

pub use admission::{AdmissionController, TaskDefLookup, TaskDefRegistry};
pub use config::{ConfigManager, EventsConfig};
pub use database::{ExecutionStore, InMemoryExecutionStore, PostgresExecutionStore};
pub use error::{Result, TaskerError};
pub use events::{ActionRegistry, EventContext, EventProcessor, FindUpdateAction, WaitTask};
pub use expression::{ExpressionError, ScriptEvaluator};
pub use orchestration::{StoreWorkflowExecutor, WorkflowExecutor};
pub use retry::{RetryEnvelope, RetryQueueManager};

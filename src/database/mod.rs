//! # Database Operations
//!
//! Persistence for the event core: the execution store contract, its
//! PostgreSQL and in-memory implementations, connection setup, and schema
//! migrations.
//!
//! ## Key Components
//!
//! - [`store`] - `ExecutionStore` and the per-definition `AdmissionUnit`
//! - [`postgres`] - JSON-document tables plus the admission ledger and rate buckets
//! - [`in_memory`] - single-process store for tests and embedded use
//! - [`connection`] - pool construction from configuration
//! - [`migrations`] - embedded schema migrations

pub mod connection;
pub mod in_memory;
pub mod migrations;
pub mod postgres;
pub mod store;

pub use connection::DatabaseConnection;
pub use in_memory::InMemoryExecutionStore;
pub use postgres::PostgresExecutionStore;
pub use store::{AdmissionUnit, ExecutionStore};

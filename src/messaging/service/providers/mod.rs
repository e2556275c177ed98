//! Durable queue providers.

pub mod in_memory;
pub mod pgmq;

pub use in_memory::InMemoryQueue;
pub use pgmq::PgmqQueue;

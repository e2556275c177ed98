//! # Durable Queue Service
//!
//! Provider-agnostic lease-based queue. Any broker that supports delayed
//! publish, receive with a visibility timeout, and delete by receipt
//! satisfies the contract; messages that are received but not deleted
//! become visible again once their lease expires.

pub mod provider;
pub mod providers;
pub mod traits;
pub mod types;

pub use provider::QueueProvider;
pub use providers::{InMemoryQueue, PgmqQueue};
pub use traits::{DurableQueue, QueueMessage};
pub use types::{MessageId, QueuedMessage, ReceiptHandle};

pub use super::MessagingError;

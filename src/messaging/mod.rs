//! # Messaging
//!
//! Broker-facing collaborators of the event core:
//!
//! - [`service`]: durable lease-based queue used by the retry queue
//!   (publish with delay, receive with visibility timeout, delete), with
//!   pgmq and in-memory providers behind the [`QueueProvider`] enum.
//! - [`source`]: lookup of a pending event message by correlation query,
//!   used by Wait tasks.

pub mod errors;
pub mod service;
pub mod source;

pub use errors::MessagingError;
pub use service::{
    DurableQueue, InMemoryQueue, MessageId, PgmqQueue, QueueMessage, QueueProvider, QueuedMessage,
    ReceiptHandle,
};
pub use source::{json_contains, InMemoryMessageSource, MessageSource, PgMessageSource};

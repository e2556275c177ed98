//! # Retry Queue
//!
//! At-least-once delivery of event actions over a durable queue. Envelopes
//! are leased with a visibility timeout and handed to a bounded worker pool.
//! A failed run leaves the envelope leased so it becomes visible again when
//! the lease expires; a successful run deletes it and, while deliveries
//! remain, publishes a follow-up envelope.

pub mod envelope;
pub mod manager;

pub use envelope::RetryEnvelope;
pub use manager::RetryQueueManager;

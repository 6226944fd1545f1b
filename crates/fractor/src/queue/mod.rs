//! Work queues
//!
//! Three queue flavors feed the supervisor:
//! - [`WorkQueue`]: unbounded thread-safe FIFO
//! - [`PriorityWorkQueue`]: blocking queue ordered by (priority, created_at)
//!   with optional aging promotion
//! - [`PersistentWorkQueue`]: FIFO wrapped around a pluggable [`Persister`]

pub mod fifo;
pub mod persistent;
pub mod priority;

pub use fifo::WorkQueue;
pub use persistent::{JsonPersister, PersistedRecord, PersistentWorkQueue, Persister};
pub use priority::{AgingConfig, PriorityQueueStats, PriorityWorkQueue};

/// Errors raised by queue operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("Invalid work record: {0}")]
    InvalidWork(String),

    #[error("Queue is closed")]
    Closed,

    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Queue result type
pub type QueueResult<T> = std::result::Result<T, QueueError>;

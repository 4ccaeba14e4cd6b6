//! Job admission and scheduling.

mod job_queue;

pub use job_queue::{JobQueue, QueueStatus, Ticket};

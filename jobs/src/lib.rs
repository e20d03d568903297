pub mod processor;
pub mod queue;
pub mod worker;

pub use processor::{DocumentProcessor, ProcessingError};
pub use queue::{ChannelJobQueue, Job, JobQueue, QueueClosed};
pub use worker::WorkerPool;

//! A bounded parallel batch pipeline: one reader feeds a bounded queue, a
//! pool of worker threads transforms batches concurrently, and an optional
//! single writer drains the results.

pub mod batch;
pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod queue;
pub mod reader;
pub mod stats;
pub mod task;
pub mod worker;
pub mod writer;

pub use batch::{Batch, QueueItem};
pub use config::{ConfigError, PipelineConfig};
pub use errors::{BoxedError, PipelineError};
pub use lifecycle::{Pipeline, PipelineReport, STUCK_SHUTDOWN_RETRIES};
pub use reader::Reader;
pub use stats::Stats;
pub use task::{Task, Tasks};
pub use writer::Writer;

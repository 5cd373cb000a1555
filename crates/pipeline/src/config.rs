//! Immutable, validated pipeline tuning parameters.

use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Tuning knobs for a single [`crate::Pipeline::run`] call.
///
/// Constructed through [`PipelineConfig::new`], which rejects zero-valued
/// fields synchronously instead of letting them surface as a panic or a
/// silent hang deep inside the run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub num_tasks: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    pub capacity: NonZeroUsize,
    pub abort_on_fail: bool,
    /// Reserved: ordering at the writer is not implemented (see design notes).
    pub sorted: bool,
    pub read_queue_put_timeout: Duration,
}

impl PipelineConfig {
    pub fn new(
        num_tasks: usize,
        batch_size: usize,
        capacity: usize,
        abort_on_fail: bool,
    ) -> Result<Self, ConfigError> {
        let num_tasks = NonZeroUsize::new(num_tasks).ok_or(ConfigError::ZeroTasks)?;
        let batch_size = NonZeroUsize::new(batch_size).ok_or(ConfigError::ZeroBatchSize)?;
        let capacity = NonZeroUsize::new(capacity).ok_or(ConfigError::ZeroCapacity)?;
        Ok(Self {
            num_tasks,
            batch_size,
            capacity,
            abort_on_fail,
            sorted: false,
            read_queue_put_timeout: Duration::from_millis(500),
        })
    }

    pub fn with_read_queue_put_timeout(mut self, timeout: Duration) -> Self {
        self.read_queue_put_timeout = timeout;
        self
    }

    pub fn with_sorted(mut self, sorted: bool) -> Self {
        self.sorted = sorted;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    ZeroTasks,
    ZeroBatchSize,
    ZeroCapacity,
    TaskCountMismatch { expected: usize, found: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroTasks => write!(f, "num_tasks must be at least 1"),
            Self::ZeroBatchSize => write!(f, "batch_size must be at least 1"),
            Self::ZeroCapacity => write!(f, "capacity must be at least 1"),
            Self::TaskCountMismatch { expected, found } => write!(
                f,
                "task list length {found} does not match configured num_tasks {expected}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

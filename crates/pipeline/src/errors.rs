//! The pipeline's failure hierarchy and its append-only error sink.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::ConfigError;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can make a [`crate::Pipeline::run`] call fail or report a
/// recorded failure.
#[derive(Debug)]
pub enum PipelineError {
    Config(ConfigError),
    Read(BoxedError),
    Apply(BoxedError),
    Write(BoxedError),
    StuckQueue { queue_depth: usize, waited: Duration },
    Cancelled,
    Composite { count: usize, first: Box<PipelineError> },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(cause) => write!(f, "invalid configuration: {cause}"),
            Self::Read(cause) => write!(f, "reader failed: {cause}"),
            Self::Apply(cause) => write!(f, "task failed: {cause}"),
            Self::Write(cause) => write!(f, "writer failed: {cause}"),
            Self::StuckQueue { queue_depth, waited } => write!(
                f,
                "read queue stuck at depth {queue_depth} after waiting {waited:?} with no live workers"
            ),
            Self::Cancelled => write!(f, "pipeline was cancelled"),
            Self::Composite { count, first } => {
                write!(f, "{count} task(s) failed; first cause: {first}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<ConfigError> for PipelineError {
    fn from(cause: ConfigError) -> Self {
        Self::Config(cause)
    }
}

/// A panic payload turned into a normal error so it can travel through
/// [`PipelineError`] like any other recorded failure.
#[derive(Debug)]
pub struct Panicked(String);

impl fmt::Display for Panicked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panicked: {}", self.0)
    }
}

impl std::error::Error for Panicked {}

pub fn describe_panic(payload: Box<dyn std::any::Any + Send>) -> Panicked {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    Panicked(message)
}

/// The append-only, mutex-guarded record of every failure observed during a
/// run. Pushes hold the lock only long enough to append, so a slow reporter
/// never blocks a worker for more than a memory copy.
#[derive(Debug, Default)]
pub struct ErrorSink {
    errors: Mutex<Vec<PipelineError>>,
}

impl ErrorSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, error: PipelineError) {
        self.errors.lock().push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    /// Drains everything recorded so far. Intended to be called once all
    /// worker and writer threads have joined.
    pub fn take(&self) -> Vec<PipelineError> {
        std::mem::take(&mut *self.errors.lock())
    }
}

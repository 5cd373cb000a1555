//! The user-supplied transform applied to every batch.

use std::sync::Arc;

/// A batch-in, batch-out transform run by one worker thread.
///
/// `pre`/`post` run exactly once per task *instance* (see [`Tasks::resolve`]);
/// `apply` may run any number of times, including zero; `drain` runs exactly
/// once, after the last `apply`, and defaults to producing nothing.
pub trait Task<I, O>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn pre(&self) {}

    fn apply(&self, items: Vec<I>) -> Result<Vec<O>, Self::Error>;

    fn drain(&self) -> Result<Vec<O>, Self::Error> {
        Ok(Vec::new())
    }

    fn post(&self) {}
}

/// How task instances are supplied to the pipeline.
pub enum Tasks<I, O, E> {
    /// One instance, shared across every worker. Thread-safety of `apply` is
    /// the task's own responsibility in this mode.
    Shared(Arc<dyn Task<I, O, Error = E>>),
    /// A factory invoked once per worker so each gets a private instance.
    Supplier(Box<dyn Fn() -> Arc<dyn Task<I, O, Error = E>> + Send + Sync>),
    /// An explicit, already-constructed instance per worker. Its length must
    /// equal `num_tasks`.
    List(Vec<Arc<dyn Task<I, O, Error = E>>>),
}

impl<I, O, E> Tasks<I, O, E> {
    /// Resolves this specification into exactly `num_tasks` instances.
    ///
    /// A [`Tasks::List`] whose length disagrees with `num_tasks` is a
    /// configuration error rather than a silent truncation or padding.
    pub fn resolve(
        self,
        num_tasks: usize,
    ) -> Result<Vec<Arc<dyn Task<I, O, Error = E>>>, crate::config::ConfigError> {
        match self {
            Self::Shared(task) => Ok(std::iter::repeat(task).take(num_tasks).collect()),
            Self::Supplier(make) => Ok((0..num_tasks).map(|_| make()).collect()),
            Self::List(tasks) => {
                if tasks.len() != num_tasks {
                    return Err(crate::config::ConfigError::TaskCountMismatch {
                        expected: num_tasks,
                        found: tasks.len(),
                    });
                }
                Ok(tasks)
            }
        }
    }
}

/// Calls `f` exactly once per distinct task *instance*, so a [`Tasks::Shared`]
/// task shared by every worker still has `pre`/`post` invoked a single time
/// rather than once per worker.
pub fn for_each_distinct_instance<I, O, E>(
    tasks: &[Arc<dyn Task<I, O, Error = E>>],
    mut f: impl FnMut(&Arc<dyn Task<I, O, Error = E>>),
) {
    let mut seen: Vec<&Arc<dyn Task<I, O, Error = E>>> = Vec::new();
    for task in tasks {
        if seen.iter().any(|other| Arc::ptr_eq(other, task)) {
            continue;
        }
        seen.push(task);
        f(task);
    }
}

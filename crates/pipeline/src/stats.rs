//! Per-run timing accumulators and the shared worker-finalize state.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use pipeline_profiling::TaskTimer;

pub const LABEL_READING: &str = "reading";
pub const LABEL_BLOCKED_PUT_READ: &str = "blocked_at_put_read";
pub const LABEL_BLOCKED_TAKE_READ: &str = "blocked_at_take_read";
pub const LABEL_TASK_APPLY: &str = "task_apply";
pub const LABEL_BLOCKED_PUT_WRITE: &str = "blocked_at_put_write";
pub const LABEL_BLOCKED_TAKE_WRITE: &str = "blocked_at_take_write";
pub const LABEL_WRITING: &str = "writing";

/// Wall-clock totals accumulated over one `run()`, keyed by the stage labels
/// above plus the end-to-end `total` duration.
///
/// Individual measurements are taken through a [`TaskTimer`]; `finish_timing`
/// folds whatever it has recorded so far into `totals`, which is the shape
/// that survives being merged across threads.
#[derive(Debug)]
pub struct Stats {
    timer: TaskTimer,
    totals: HashMap<&'static str, Duration>,
    pub total: Duration,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            timer: TaskTimer::new(true),
            totals: HashMap::new(),
            total: Duration::default(),
        }
    }
}

impl Stats {
    /// Times `f` under `label`, enabled for the lifetime of this `Stats`.
    pub fn time<R>(&self, label: &'static str, f: impl FnOnce() -> R) -> R {
        self.timer.time(label, f)
    }

    /// Drains everything recorded by `time` so far into `totals`. Call once
    /// a thread is done recording, before handing its `Stats` back to be
    /// merged with everyone else's.
    pub fn finish_timing(&mut self) {
        let mut recorded = Vec::new();
        self.timer.report_task_execution_times(&mut recorded);
        for task in recorded {
            *self.totals.entry(task.label).or_default() += task.duration;
        }
    }

    pub fn merge(&mut self, other: &Stats) {
        for (label, duration) in &other.totals {
            *self.totals.entry(label).or_default() += *duration;
        }
    }

    pub fn get(&self, label: &'static str) -> Duration {
        self.totals.get(label).copied().unwrap_or_default()
    }

    /// Emits one diagnostic log line per recorded label, plus `total`.
    pub fn log_summary(&self) {
        for label in [
            LABEL_READING,
            LABEL_BLOCKED_PUT_READ,
            LABEL_BLOCKED_TAKE_READ,
            LABEL_TASK_APPLY,
            LABEL_BLOCKED_PUT_WRITE,
            LABEL_BLOCKED_TAKE_WRITE,
            LABEL_WRITING,
        ] {
            pipeline_log::info!("{label} = {:?}", self.get(label));
        }
        pipeline_log::info!("total = {:?}", self.total);
    }
}

/// Finished-worker count, used only to tell the last worker to stop so it
/// can forward the sentinel to the write queue. `Pipeline::run` builds the
/// final merged [`Stats`] itself from each worker's returned value after
/// `join`, so this doesn't need to duplicate that fold.
#[derive(Debug)]
pub struct FinalizeState {
    finished_tasks: Mutex<usize>,
    num_tasks: usize,
}

impl FinalizeState {
    pub fn new(num_tasks: usize) -> Self {
        Self {
            finished_tasks: Mutex::new(0),
            num_tasks,
        }
    }

    /// Increments the finished count and reports whether this was the last
    /// worker to finish.
    pub fn finish_worker(&self) -> bool {
        let mut finished_tasks = self.finished_tasks.lock();
        *finished_tasks += 1;
        debug_assert!(*finished_tasks <= self.num_tasks);
        *finished_tasks == self.num_tasks
    }

    pub fn finished_tasks(&self) -> usize {
        *self.finished_tasks.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_worker_to_finish_is_reported() {
        let state = FinalizeState::new(2);
        assert!(!state.finish_worker());
        assert!(state.finish_worker());
    }

    #[test]
    fn finished_tasks_is_monotonically_non_decreasing() {
        let state = FinalizeState::new(3);
        state.finish_worker();
        assert_eq!(state.finished_tasks(), 1);
        state.finish_worker();
        assert_eq!(state.finished_tasks(), 2);
    }

    #[test]
    fn worker_timers_are_folded_across_threads_via_merge() {
        let mut worker_stats = Stats::default();
        worker_stats.time(LABEL_TASK_APPLY, || std::thread::sleep(Duration::from_millis(5)));
        worker_stats.finish_timing();

        let mut combined = Stats::default();
        combined.merge(&worker_stats);
        assert!(combined.get(LABEL_TASK_APPLY) >= Duration::from_millis(5));
    }
}

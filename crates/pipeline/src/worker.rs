//! Worker threads: take a batch, apply the task, forward the result.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::batch::{Batch, QueueItem};
use crate::errors::{ErrorSink, PipelineError, describe_panic};
use crate::queue::{QueueReceiver, QueueSender};
use crate::stats::{self, FinalizeState, Stats};
use crate::task::Task;

/// Everything one worker thread needs, independent of every other worker.
pub struct WorkerContext<I, O, E> {
    pub task: Arc<dyn Task<I, O, Error = E>>,
    /// `None` when no reader is configured: the worker synthesizes empty
    /// input batches instead of taking them from a queue.
    pub read_rx: Option<QueueReceiver<I>>,
    /// Used only to re-enqueue the sentinel so sibling workers also observe
    /// it; never used to send ordinary data.
    pub read_tx: Option<QueueSender<I>>,
    pub write_tx: Option<QueueSender<O>>,
    pub cancel: Arc<AtomicBool>,
    pub errors: Arc<ErrorSink>,
    pub finalize: Arc<FinalizeState>,
    pub abort_on_fail: bool,
}

/// Runs one worker to completion: takes batches (or synthesizes them) until
/// it observes the sentinel or end-of-stream, applies the task to each, and
/// forwards results. Returns once `drain`/finalize bookkeeping is done.
pub fn run_worker<I, O, E>(ctx: WorkerContext<I, O, E>) -> Stats
where
    E: std::error::Error + Send + Sync + 'static,
{
    let mut stats = Stats::default();
    let mut next_position: u64 = 0;
    let mut last_position: u64 = 0;
    let mut cancelled = false;

    loop {
        if ctx.cancel.load(Ordering::SeqCst) {
            cancelled = true;
            break;
        }

        let batch = match &ctx.read_rx {
            Some(rx) => {
                let received = stats.time(stats::LABEL_BLOCKED_TAKE_READ, || rx.recv());
                match received {
                    Ok(QueueItem::Sentinel) => {
                        if let Some(tx) = &ctx.read_tx {
                            // best-effort: if every sender side is already
                            // gone the sentinel has propagated to everyone
                            // who still needs it.
                            let _ = tx.send(QueueItem::Sentinel);
                        }
                        break;
                    }
                    Ok(QueueItem::Data(batch)) => batch,
                    Err(_) => {
                        cancelled = true;
                        break;
                    }
                }
            }
            None => {
                let position = next_position;
                next_position += 1;
                Batch::new(Vec::new(), position)
            }
        };
        last_position = batch.position;

        let outcome = stats.time(stats::LABEL_TASK_APPLY, || {
            panic::catch_unwind(AssertUnwindSafe(|| ctx.task.apply(batch.items)))
        });

        let result = match outcome {
            Ok(Ok(items)) => Some(items),
            Ok(Err(cause)) => {
                ctx.errors.push(PipelineError::Apply(Box::new(cause)));
                None
            }
            Err(payload) => {
                ctx.errors.push(PipelineError::Apply(Box::new(describe_panic(payload))));
                None
            }
        };

        if ctx.read_rx.is_none() {
            if matches!(&result, Some(items) if items.is_empty()) {
                break;
            }
        }

        if ctx.abort_on_fail && !ctx.errors.is_empty() {
            break;
        }

        if let (Some(items), Some(tx)) = (result, &ctx.write_tx) {
            if !items.is_empty() {
                stats.time(stats::LABEL_BLOCKED_PUT_WRITE, || {
                    let _ = tx.send(QueueItem::Data(Batch::new(items, batch.position)));
                });
            }
        }
    }

    if !cancelled {
        let drained = panic::catch_unwind(AssertUnwindSafe(|| ctx.task.drain()));
        match drained {
            Ok(Ok(items)) if !items.is_empty() => {
                if let Some(tx) = &ctx.write_tx {
                    let _ = tx.send(QueueItem::Data(Batch::new(items, last_position + 1)));
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(cause)) => ctx.errors.push(PipelineError::Apply(Box::new(cause))),
            Err(payload) => ctx
                .errors
                .push(PipelineError::Apply(Box::new(describe_panic(payload)))),
        }
    }

    stats.finish_timing();
    let is_last = ctx.finalize.finish_worker();
    if is_last {
        if let Some(tx) = &ctx.write_tx {
            let _ = tx.send(QueueItem::Sentinel);
        }
    }

    stats
}

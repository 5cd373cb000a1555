//! The pipeline controller: wires up queues and threads and sequences the
//! pre/apply/drain/post/close phases described by the data model.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::SendTimeoutError;

use crate::batch::{Batch, QueueItem};
use crate::config::PipelineConfig;
use crate::errors::{ErrorSink, PipelineError, describe_panic};
use crate::queue::{QueueReceiver, QueueSender, bounded_queue};
use crate::reader::{DynReader, Reader, box_reader};
use crate::stats::{self, FinalizeState, Stats};
use crate::task::{Tasks, for_each_distinct_instance};
use crate::writer::{DynWriter, Writer, box_writer};
use crate::worker::{WorkerContext, run_worker};

/// How many one-second polls the controller gives a shutdown before
/// detaching the remaining threads instead of blocking forever.
pub const STUCK_SHUTDOWN_RETRIES: u32 = 30;

/// What a successful (or partially failed, with `abort_on_fail = false`)
/// run produces: the aggregated timing breakdown and every non-fatal error
/// recorded along the way.
#[derive(Debug)]
pub struct PipelineReport {
    pub stats: Stats,
    pub exceptions: Vec<PipelineError>,
}

/// A fully wired bounded parallel batch pipeline, ready to run once.
///
/// `run` consumes the pipeline: reader, writer and tasks are borrowed for
/// exactly one invocation and are not handed back afterward. The reader and
/// writer are held behind a boxed, error-erased trait object so that
/// `with_reader`/`with_writer` can accept any concrete implementation
/// without threading its type through `Pipeline`'s own parameters.
pub struct Pipeline<I, O, TE>
where
    TE: std::error::Error + Send + Sync + 'static,
{
    reader: Option<DynReader<I>>,
    writer: Option<DynWriter<O>>,
    tasks: Tasks<I, O, TE>,
    config: PipelineConfig,
}

impl<I, O, TE> Pipeline<I, O, TE>
where
    I: Send + 'static,
    O: Send + 'static,
    TE: std::error::Error + Send + Sync + 'static,
{
    pub fn new(config: PipelineConfig, tasks: Tasks<I, O, TE>) -> Self {
        Self {
            reader: None,
            writer: None,
            tasks,
            config,
        }
    }

    pub fn with_reader<R>(mut self, reader: R) -> Self
    where
        R: Reader<I> + 'static,
    {
        self.reader = Some(box_reader(reader));
        self
    }

    pub fn with_writer<W>(mut self, writer: W) -> Self
    where
        W: Writer<O> + 'static,
    {
        self.writer = Some(box_writer(writer));
        self
    }

    pub fn run(self) -> Result<PipelineReport, PipelineError> {
        let Pipeline {
            mut reader,
            mut writer,
            tasks,
            config,
        } = self;

        let run_start = Instant::now();
        let num_tasks = config.num_tasks.get();
        let task_instances = tasks.resolve(num_tasks)?;

        let errors = ErrorSink::new();
        let cancel = Arc::new(AtomicBool::new(false));
        let finalize = Arc::new(FinalizeState::new(num_tasks));

        if let Some(reader) = reader.as_mut() {
            open_reader(reader, &errors);
        }
        if let Some(writer) = writer.as_mut() {
            open_writer(writer, &errors);
        }
        for_each_distinct_instance(&task_instances, |task| task.pre());

        let read_channel = reader
            .is_some()
            .then(|| bounded_queue::<I>(config.capacity));
        let write_channel = writer
            .is_some()
            .then(|| bounded_queue::<O>(config.capacity));

        let mut worker_handles: Vec<JoinHandle<Stats>> = Vec::with_capacity(num_tasks);
        for task in &task_instances {
            let ctx = WorkerContext {
                task: Arc::clone(task),
                read_rx: read_channel.as_ref().map(|(_, rx)| rx.clone()),
                read_tx: read_channel.as_ref().map(|(tx, _)| tx.clone()),
                write_tx: write_channel.as_ref().map(|(tx, _)| tx.clone()),
                cancel: Arc::clone(&cancel),
                errors: Arc::clone(&errors),
                finalize: Arc::clone(&finalize),
                abort_on_fail: config.abort_on_fail,
            };
            let handle = thread::Builder::new()
                .name("pipeline-worker".to_string())
                .spawn(move || run_worker(ctx))
                .expect("failed to spawn worker thread");
            worker_handles.push(handle);
        }

        // Drop the controller's own read-queue sender/receiver clones so the
        // channel's only producers/consumers are the reader loop (below) and
        // the worker threads; likewise for the write queue and the writer
        // thread spawned next.
        let read_tx_for_reader = read_channel.as_ref().map(|(tx, _)| tx.clone());
        drop(read_channel);

        let writer_handle: Option<JoinHandle<Stats>> = write_channel.as_ref().map(|(_, rx)| {
            let writer = writer.take().expect("writer channel implies writer present");
            let rx = rx.clone();
            let errors = Arc::clone(&errors);
            let abort_on_fail = config.abort_on_fail;
            thread::Builder::new()
                .name("pipeline-writer".to_string())
                .spawn(move || run_writer_loop(writer, rx, errors, abort_on_fail))
                .expect("failed to spawn writer thread")
        });
        drop(write_channel);

        let mut reader_stats = Stats::default();
        if let (Some(reader), Some(read_tx)) = (reader.as_mut(), read_tx_for_reader) {
            reader_stats = run_reader_loop(reader, read_tx, &worker_handles, &config, &errors);
        }

        await_termination(&worker_handles, writer_handle.as_ref(), &cancel);

        for_each_distinct_instance(&task_instances, |task| task.post());
        if let Some(reader) = reader.as_mut() {
            close_reader(reader, &errors);
        }

        let mut stats = reader_stats;
        for handle in worker_handles {
            if let Ok(worker_stats) = handle.join() {
                stats.merge(&worker_stats);
            } else {
                errors.push(PipelineError::Apply(Box::new(describe_panic(
                    Box::new("worker thread panicked outside the task boundary"),
                ))));
            }
        }
        if let Some(handle) = writer_handle {
            match handle.join() {
                Ok(writer_stats) => stats.merge(&writer_stats),
                Err(_) => errors.push(PipelineError::Write(Box::new(describe_panic(Box::new(
                    "writer thread panicked outside the write boundary",
                ))))),
            }
        }
        stats.total = run_start.elapsed();

        let exceptions = errors.take();
        if config.abort_on_fail && !exceptions.is_empty() {
            let count = exceptions.len();
            let mut iter = exceptions.into_iter();
            let first = Box::new(iter.next().expect("non-empty"));
            return Err(PipelineError::Composite { count, first });
        }

        stats.log_summary();
        Ok(PipelineReport { stats, exceptions })
    }
}

fn open_reader<I, R>(reader: &mut R, errors: &ErrorSink)
where
    R: Reader<I>,
{
    if let Err(cause) = reader.open() {
        errors.push(PipelineError::Read(Box::new(cause)));
        return;
    }
    reader.pre();
}

fn close_reader<I, R>(reader: &mut R, errors: &ErrorSink)
where
    R: Reader<I>,
{
    reader.post();
    if let Err(cause) = reader.close() {
        errors.push(PipelineError::Read(Box::new(cause)));
    }
}

fn open_writer<O, W>(writer: &mut W, errors: &ErrorSink)
where
    W: Writer<O>,
{
    if let Err(cause) = writer.open() {
        errors.push(PipelineError::Write(Box::new(cause)));
        return;
    }
    writer.pre();
}

fn run_writer_loop<O, W>(
    mut writer: W,
    write_rx: QueueReceiver<O>,
    errors: Arc<ErrorSink>,
    abort_on_fail: bool,
) -> Stats
where
    W: Writer<O>,
{
    let mut stats = Stats::default();
    loop {
        let received = stats.time(stats::LABEL_BLOCKED_TAKE_WRITE, || write_rx.recv());

        match received {
            Ok(QueueItem::Sentinel) => break,
            Ok(QueueItem::Data(batch)) => {
                let outcome = stats.time(stats::LABEL_WRITING, || {
                    panic::catch_unwind(AssertUnwindSafe(|| writer.write(batch.items)))
                });
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(cause)) => {
                        errors.push(PipelineError::Write(Box::new(cause)));
                        if abort_on_fail {
                            break;
                        }
                    }
                    Err(payload) => {
                        errors.push(PipelineError::Write(Box::new(describe_panic(payload))));
                        if abort_on_fail {
                            break;
                        }
                    }
                }
            }
            Err(_) => break,
        }
    }
    writer.post();
    if let Err(cause) = writer.close() {
        errors.push(PipelineError::Write(Box::new(cause)));
    }
    stats.finish_timing();
    stats
}

/// Runs on the caller's thread. Reads batches, enqueues them onto the read
/// queue with a one-second bounded offer, and detects a stuck queue once no
/// worker remains alive to drain it.
///
/// There is no concurrent cancel source for the reader: it runs synchronously
/// on the thread that called `run()`, and nothing else observes or acts on
/// its behalf while it's blocked in `read`/`send_timeout`. Termination is
/// entirely driven by what the reader itself observes (end of stream, a read
/// error, or a dead worker pool), each of which enqueues the sentinel before
/// returning.
fn run_reader_loop<I, R>(
    reader: &mut R,
    read_tx: QueueSender<I>,
    worker_handles: &[JoinHandle<Stats>],
    config: &PipelineConfig,
    errors: &ErrorSink,
) -> Stats
where
    R: Reader<I>,
{
    let mut stats = Stats::default();
    let mut position: u64 = 0;
    let batch_size = config.batch_size.get();
    let offer_interval = Duration::from_secs(1);
    let stuck_attempts_threshold = (config.read_queue_put_timeout.as_millis() / 1000) as u32;

    loop {
        let read_result = stats.time(stats::LABEL_READING, || {
            panic::catch_unwind(AssertUnwindSafe(|| reader.read(batch_size)))
        });

        let items = match read_result {
            Ok(Ok(items)) => items,
            Ok(Err(cause)) => {
                errors.push(PipelineError::Read(Box::new(cause)));
                let _ = read_tx.send(QueueItem::Sentinel);
                stats.finish_timing();
                return stats;
            }
            Err(payload) => {
                errors.push(PipelineError::Read(Box::new(describe_panic(payload))));
                let _ = read_tx.send(QueueItem::Sentinel);
                stats.finish_timing();
                return stats;
            }
        };

        if items.is_empty() {
            let _ = read_tx.send(QueueItem::Sentinel);
            stats.finish_timing();
            return stats;
        }

        let mut pending = QueueItem::Data(Batch::new(items, position));
        position += 1;
        let mut consecutive_failures: u32 = 0;

        loop {
            let send_result = stats.time(stats::LABEL_BLOCKED_PUT_READ, || {
                read_tx.send_timeout(pending, offer_interval)
            });

            match send_result {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(item)) => {
                    pending = item;
                    consecutive_failures += 1;

                    let all_workers_dead = worker_handles.iter().all(|h| h.is_finished());
                    if all_workers_dead && read_tx.len() > 0 {
                        errors.push(PipelineError::StuckQueue {
                            queue_depth: read_tx.len(),
                            waited: offer_interval * consecutive_failures,
                        });
                        stats.finish_timing();
                        return stats;
                    }
                    if consecutive_failures > stuck_attempts_threshold {
                        errors.push(PipelineError::StuckQueue {
                            queue_depth: read_tx.len(),
                            waited: offer_interval * consecutive_failures,
                        });
                        stats.finish_timing();
                        return stats;
                    }
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    stats.finish_timing();
                    return stats;
                }
            }
        }

        if config.abort_on_fail && !errors.is_empty() {
            let _ = read_tx.send(QueueItem::Sentinel);
            stats.finish_timing();
            return stats;
        }
    }
}

/// Waits for every worker thread, and the writer thread if there is one, to
/// finish. Rust join handles have no native timeout, so the stuck-
/// termination guard polls `is_finished()` in one-second steps instead of
/// calling a non-existent forced shutdown; once the retry budget is
/// exhausted it gives up waiting and lets the handles be joined (and thus
/// block, if they truly never finish) by the caller.
fn await_termination(
    worker_handles: &[JoinHandle<Stats>],
    writer_handle: Option<&JoinHandle<Stats>>,
    cancel: &AtomicBool,
) {
    let all_finished = |worker_handles: &[JoinHandle<Stats>], writer_handle: Option<&JoinHandle<Stats>>| {
        worker_handles.iter().all(|h| h.is_finished())
            && writer_handle.is_none_or(|h| h.is_finished())
    };
    for _ in 0..STUCK_SHUTDOWN_RETRIES {
        if all_finished(worker_handles, writer_handle) {
            return;
        }
        thread::sleep(Duration::from_secs(1));
    }
    cancel.store(true, Ordering::SeqCst);
}

//! Fixtures shared by the pipeline integration tests.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pipeline::{Reader, Task, Writer};

/// Yields items from an in-memory vector, `batch_size` at a time. `opened`
/// and `closed` are shared handles so a test can observe them after the
/// reader itself has moved into the pipeline.
pub struct VecReader<T> {
    items: std::vec::IntoIter<T>,
    pub opened: Arc<AtomicBool>,
    pub closed: Arc<AtomicBool>,
}

impl<T> VecReader<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into_iter(),
            opened: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl<T: Send> Reader<T> for VecReader<T> {
    type Error = Infallible;

    fn open(&mut self) -> Result<(), Self::Error> {
        self.opened.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self, max: usize) -> Result<Vec<T>, Self::Error> {
        Ok((&mut self.items).take(max).collect())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Collects written items into a shared `Vec` so the test can inspect them
/// after the pipeline has finished (the writer itself moves onto its own
/// thread and never comes back).
#[derive(Clone)]
pub struct CollectingWriter<T> {
    pub collected: Arc<Mutex<Vec<T>>>,
    pub closed: Arc<std::sync::atomic::AtomicBool>,
}

impl<T> CollectingWriter<T> {
    pub fn new() -> Self {
        Self {
            collected: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }
}

impl<T: Send> Writer<T> for CollectingWriter<T> {
    type Error = Infallible;

    fn write(&mut self, items: Vec<T>) -> Result<(), Self::Error> {
        self.collected.lock().unwrap().extend(items);
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Doubles every `u32` it sees.
pub struct Double;

impl Task<u32, u32> for Double {
    type Error = Infallible;

    fn apply(&self, items: Vec<u32>) -> Result<Vec<u32>, Self::Error> {
        Ok(items.into_iter().map(|x| x * 2).collect())
    }
}

/// The identity transform.
pub struct Identity;

impl Task<u32, u32> for Identity {
    type Error = Infallible;

    fn apply(&self, items: Vec<u32>) -> Result<Vec<u32>, Self::Error> {
        Ok(items)
    }
}

#[derive(Debug)]
pub struct Boom;

impl std::fmt::Display for Boom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "boom")
    }
}

impl std::error::Error for Boom {}

/// Fails on its first call, succeeds (as a no-op) afterward.
pub struct FailsOnce {
    calls: AtomicUsize,
}

impl FailsOnce {
    pub fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }
}

impl Task<u32, u32> for FailsOnce {
    type Error = Boom;

    fn apply(&self, items: Vec<u32>) -> Result<Vec<u32>, Self::Error> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(Boom)
        } else {
            Ok(items)
        }
    }
}

/// A generator-style task used for the no-reader scenario: yields a fixed
/// payload on its first call, nothing afterward, then drains a final item.
pub struct Generator {
    calls: AtomicUsize,
    first_output: Vec<String>,
    drain_output: Vec<String>,
}

impl Generator {
    pub fn new(first_output: Vec<String>, drain_output: Vec<String>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            first_output,
            drain_output,
        }
    }
}

impl Task<String, String> for Generator {
    type Error = Infallible;

    fn apply(&self, _items: Vec<String>) -> Result<Vec<String>, Self::Error> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(self.first_output.clone())
        } else {
            Ok(Vec::new())
        }
    }

    fn drain(&self) -> Result<Vec<String>, Self::Error> {
        Ok(self.drain_output.clone())
    }
}

/// Sleeps briefly, then always fails. Combined with `abort_on_fail = true`
/// this makes a worker process exactly one batch and exit, simulating a
/// worker pool that dies out from under a reader that still has more to
/// send.
pub struct SleepsThenErrors {
    sleep: std::time::Duration,
}

impl SleepsThenErrors {
    pub fn new(sleep: std::time::Duration) -> Self {
        Self { sleep }
    }
}

impl Task<u32, u32> for SleepsThenErrors {
    type Error = Boom;

    fn apply(&self, _items: Vec<u32>) -> Result<Vec<u32>, Self::Error> {
        std::thread::sleep(self.sleep);
        Err(Boom)
    }
}

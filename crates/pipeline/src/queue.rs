//! Bounded handoff channels between pipeline stages.

use std::num::NonZeroUsize;

use crossbeam_channel::{Receiver, Sender};

use crate::batch::QueueItem;

pub type QueueSender<T> = Sender<QueueItem<T>>;
pub type QueueReceiver<T> = Receiver<QueueItem<T>>;

/// Creates a bounded FIFO channel holding at most `capacity` batches.
///
/// `crossbeam_channel`'s bounded channel is the idiomatic stand-in for a
/// blocking `put`/`take` queue: `send`/`send_timeout` block (or time out)
/// when full, `recv` blocks when empty, and the channel closes once every
/// `Sender` is dropped, which unblocks anyone parked in `recv`.
pub fn bounded_queue<T>(capacity: NonZeroUsize) -> (QueueSender<T>, QueueReceiver<T>) {
    crossbeam_channel::bounded(capacity.get())
}

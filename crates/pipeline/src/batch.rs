//! The unit of data handed between pipeline stages.

/// A bounded ordered group of items assigned a monotonically increasing
/// position by the reader.
///
/// `position` is advisory only: nothing downstream of the reader relies on
/// positions being contiguous, and workers may finish batches out of order.
#[derive(Debug, Clone)]
pub struct Batch<T> {
    pub items: Vec<T>,
    pub position: u64,
}

impl<T> Batch<T> {
    pub fn new(items: Vec<T>, position: u64) -> Self {
        Self { items, position }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Either an ordinary batch or the end-of-stream marker.
///
/// Encoding the sentinel as its own variant (rather than as an empty batch
/// with a reserved position) means "is this the end of the stream" is a
/// pattern match, never an equality check against a magic value.
#[derive(Debug, Clone)]
pub enum QueueItem<T> {
    Data(Batch<T>),
    Sentinel,
}

impl<T> QueueItem<T> {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Sentinel)
    }

    pub fn into_batch(self) -> Option<Batch<T>> {
        match self {
            Self::Data(batch) => Some(batch),
            Self::Sentinel => None,
        }
    }
}

//! The upstream source the reader loop pulls batches from.

use crate::errors::BoxedError;

/// Supplies items to the pipeline in caller-driven chunks of up to
/// `max` items. `open`/`pre` run once before the first call to `read`;
/// `post`/`close` run once after the reader loop has stopped calling it.
pub trait Reader<I>: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    fn open(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn pre(&mut self) {}

    /// Returns up to `max` items. An empty or shorter-than-`max` result
    /// signals end-of-stream.
    fn read(&mut self, max: usize) -> Result<Vec<I>, Self::Error>;

    fn post(&mut self) {}

    fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<I, T> Reader<I> for Box<T>
where
    T: Reader<I> + ?Sized,
{
    type Error = T::Error;

    fn open(&mut self) -> Result<(), Self::Error> {
        (**self).open()
    }

    fn pre(&mut self) {
        (**self).pre();
    }

    fn read(&mut self, max: usize) -> Result<Vec<I>, Self::Error> {
        (**self).read(max)
    }

    fn post(&mut self) {
        (**self).post();
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        (**self).close()
    }
}

/// A [`Reader`] with its associated error type erased, so the pipeline can
/// hold any reader implementation behind one concrete type.
pub(crate) type DynReader<I> = Box<dyn Reader<I, Error = BoxedError> + Send>;

struct ErasedReader<R> {
    inner: R,
}

impl<I, R> Reader<I> for ErasedReader<R>
where
    R: Reader<I>,
{
    type Error = BoxedError;

    fn open(&mut self) -> Result<(), Self::Error> {
        self.inner.open().map_err(|cause| Box::new(cause) as BoxedError)
    }

    fn pre(&mut self) {
        self.inner.pre();
    }

    fn read(&mut self, max: usize) -> Result<Vec<I>, Self::Error> {
        self.inner.read(max).map_err(|cause| Box::new(cause) as BoxedError)
    }

    fn post(&mut self) {
        self.inner.post();
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.inner.close().map_err(|cause| Box::new(cause) as BoxedError)
    }
}

pub(crate) fn box_reader<I, R>(reader: R) -> DynReader<I>
where
    I: 'static,
    R: Reader<I> + 'static,
{
    Box::new(ErasedReader { inner: reader })
}

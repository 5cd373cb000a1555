//! The downstream sink the writer loop hands result batches to.

use crate::errors::BoxedError;

/// Consumes result items. `open`/`pre` run once before the first call to
/// `write`; `post`/`close` run once after the writer loop has stopped calling
/// it.
pub trait Writer<O>: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    fn open(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn pre(&mut self) {}

    fn write(&mut self, items: Vec<O>) -> Result<(), Self::Error>;

    fn post(&mut self) {}

    fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<O, T> Writer<O> for Box<T>
where
    T: Writer<O> + ?Sized,
{
    type Error = T::Error;

    fn open(&mut self) -> Result<(), Self::Error> {
        (**self).open()
    }

    fn pre(&mut self) {
        (**self).pre();
    }

    fn write(&mut self, items: Vec<O>) -> Result<(), Self::Error> {
        (**self).write(items)
    }

    fn post(&mut self) {
        (**self).post();
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        (**self).close()
    }
}

/// A [`Writer`] with its associated error type erased, so the pipeline can
/// hold any writer implementation behind one concrete type.
pub(crate) type DynWriter<O> = Box<dyn Writer<O, Error = BoxedError> + Send>;

struct ErasedWriter<W> {
    inner: W,
}

impl<O, W> Writer<O> for ErasedWriter<W>
where
    W: Writer<O>,
{
    type Error = BoxedError;

    fn open(&mut self) -> Result<(), Self::Error> {
        self.inner.open().map_err(|cause| Box::new(cause) as BoxedError)
    }

    fn pre(&mut self) {
        self.inner.pre();
    }

    fn write(&mut self, items: Vec<O>) -> Result<(), Self::Error> {
        self.inner.write(items).map_err(|cause| Box::new(cause) as BoxedError)
    }

    fn post(&mut self) {
        self.inner.post();
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.inner.close().map_err(|cause| Box::new(cause) as BoxedError)
    }
}

pub(crate) fn box_writer<O, W>(writer: W) -> DynWriter<O>
where
    O: 'static,
    W: Writer<O> + 'static,
{
    Box::new(ErasedWriter { inner: writer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    struct VecWriter {
        items: Vec<u32>,
        closed: bool,
    }

    impl Writer<u32> for VecWriter {
        type Error = Infallible;

        fn write(&mut self, items: Vec<u32>) -> Result<(), Self::Error> {
            self.items.extend(items);
            Ok(())
        }

        fn close(&mut self) -> Result<(), Self::Error> {
            self.closed = true;
            Ok(())
        }
    }

    #[test]
    fn boxed_writer_forwards_calls_through_the_erased_error_type() {
        let writer = VecWriter {
            items: Vec::new(),
            closed: false,
        };
        let mut boxed: DynWriter<u32> = box_writer(writer);
        boxed.write(vec![1, 2]).unwrap();
        boxed.close().unwrap();
    }
}

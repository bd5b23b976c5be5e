//! [`Promise`] (write-end) and [`Future`] (read-end) handles over a shared
//! [`Cell`].

use std::fmt;
use std::sync::Arc;

use crate::cell::Cell;
use crate::error::Error;

/// Write-end of a shared cell. Fulfills the cell exactly once.
pub struct Promise<T> {
    cell: Arc<Cell<T>>,
}

impl<T: Clone + Default + Send + 'static> Promise<T> {
    /// Creates a fresh, unfulfilled promise.
    pub fn new() -> Self {
        Self {
            cell: Arc::new(Cell::new()),
        }
    }

    /// Publishes `(val, err)`. Panics if the cell was already fulfilled.
    pub fn set(&self, val: T, err: Option<Error>) {
        self.cell.set(val, err);
    }

    /// Publishes `(val, err)`, returning `false` instead of panicking if the
    /// cell was already fulfilled. The DAG engine always uses this form,
    /// since a concurrent run-level failure may race to mark the same node.
    pub fn set_safe(&self, val: T, err: Option<Error>) -> bool {
        self.cell.set_safe(val, err)
    }

    /// A new [`Future`] sharing this promise's cell. May be called any
    /// number of times to fan out to multiple readers.
    pub fn future(&self) -> Future<T> {
        Future {
            cell: self.cell.clone(),
        }
    }

    /// `true` if the cell has not yet been published to.
    pub fn is_free(&self) -> bool {
        self.cell.is_free()
    }
}

impl<T: Clone + Default + Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").finish_non_exhaustive()
    }
}

/// Read-end of a shared cell. Cheaply [`Clone`]able; every clone observes the
/// same published value.
pub struct Future<T> {
    cell: Arc<Cell<T>>,
}

impl<T: Clone + Default + Send + 'static> Future<T> {
    pub(crate) fn from_cell(cell: Arc<Cell<T>>) -> Self {
        Self { cell }
    }

    /// Already-resolved future wrapping `val`, with no error.
    pub fn done(val: T) -> Self {
        let promise = Promise::new();
        promise.set(val, None);
        promise.future()
    }

    /// Already-resolved future carrying an error.
    pub fn done_err(val: T, err: Error) -> Self {
        let promise = Promise::new();
        promise.set(val, Some(err));
        promise.future()
    }

    /// Demand-driven future: `producer` runs on the first caller of `get`,
    /// not at construction time. Subscribing before any `get` does not
    /// trigger execution.
    pub fn lazy(producer: impl FnOnce() -> (T, Option<Error>) + Send + 'static) -> Self {
        Self {
            cell: Arc::new(Cell::new_lazy(Box::new(producer))),
        }
    }

    /// Blocks the calling thread until the cell is published, then returns
    /// the result. If this future wraps a lazy cell that has not yet run,
    /// the calling thread may be elected to run the producer.
    pub fn get(&self) -> (T, Option<Error>) {
        self.cell.get()
    }

    /// Like [`Future::get`] but collapses any error into `default`.
    pub fn get_or_default(&self, default: T) -> T {
        let (val, err) = self.get();
        if err.is_some() { default } else { val }
    }

    /// Subscribes `cb` to be invoked exactly once with the published
    /// result. Fires inline if already done, else runs on the publisher's
    /// thread.
    pub fn subscribe(&self, cb: impl FnOnce(T, Option<Error>) + Send + 'static) {
        self.cell.subscribe(cb);
    }

    /// Non-blocking status check.
    pub fn is_done(&self) -> bool {
        self.cell.is_done()
    }

    pub(crate) fn cell(&self) -> &Arc<Cell<T>> {
        &self.cell
    }
}

impl<T: Clone + Default + Send + 'static> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promise_is_free_until_set() {
        let promise = Promise::<i32>::new();
        assert!(promise.is_free());
        promise.set(1, None);
        assert!(!promise.is_free());
    }

    #[test]
    fn future_is_done_flips_after_set() {
        let promise = Promise::<i32>::new();
        let future = promise.future();
        assert!(!future.is_done());
        promise.set(5, None);
        assert!(future.is_done());
    }

    #[test]
    fn get_or_default_returns_value_when_ok() {
        let future = Future::done(7);
        assert_eq!(future.get_or_default(0), 7);
    }

    #[test]
    fn get_or_default_falls_back_on_error() {
        let future = Future::done_err(7, Error::Node("bad".into()));
        assert_eq!(future.get_or_default(0), 0);
    }
}

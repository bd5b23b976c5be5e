//! Free functions that compose [`Future`]s: `submit`, `transform`,
//! `transform_async`, `race`, `join_all`, `timeout`/`deadline`.
//!
//! Each combinator follows the same subscribe-and-republish shape, built on
//! [`crate::handle::Promise::set_safe`]'s CAS-guarded one-shot flag to
//! resolve races between multiple inputs settling concurrently.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::executor::{Context, Executor};
use crate::handle::{Future, Promise};

/// Runs `f` on `executor`, converting a caught panic into [`Error::Panic`]
/// with the payload and a captured backtrace.
pub fn submit<T, F>(executor: &dyn Executor, f: F) -> Future<T>
where
    T: Clone + Default + Send + 'static,
    F: FnOnce() -> (T, Option<Error>) + Send + 'static,
{
    spawn_guarded(executor, f)
}

/// Like [`submit`], but threads a [`Context`] through to `f` so node bodies
/// can observe cancellation.
pub fn submit_with_context<T, F>(executor: &dyn Executor, ctx: Context, f: F) -> Future<T>
where
    T: Clone + Default + Send + 'static,
    F: FnOnce(Context) -> (T, Option<Error>) + Send + 'static,
{
    spawn_guarded(executor, move || f(ctx))
}

fn spawn_guarded<T, F>(executor: &dyn Executor, f: F) -> Future<T>
where
    T: Clone + Default + Send + 'static,
    F: FnOnce() -> (T, Option<Error>) + Send + 'static,
{
    let promise = Promise::<T>::new();
    let future = promise.future();
    executor.submit(Box::new(move || {
        match std::panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok((val, err)) => promise.set(val, err),
            Err(payload) => {
                let cause = panic_payload_to_string(&payload);
                let backtrace = Arc::new(std::backtrace::Backtrace::capture());
                promise.set(T::default(), Some(Error::Panic { cause, backtrace }));
            }
        }
    }));
    future
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Already-resolved future, useful as a combinator leaf.
pub fn done_of<T: Clone + Default + Send + 'static>(val: T) -> Future<T> {
    Future::done(val)
}

/// Synchronous map over a future's result.
pub fn transform<T, R>(
    f: Future<T>,
    cb: impl FnOnce(T, Option<Error>) -> (R, Option<Error>) + Send + 'static,
) -> Future<R>
where
    T: Clone + Default + Send + 'static,
    R: Clone + Default + Send + 'static,
{
    let promise = Promise::<R>::new();
    let future = promise.future();
    f.subscribe(move |val, err| {
        let (rval, rerr) = cb(val, err);
        promise.set(rval, rerr);
    });
    future
}

/// Future-returning map over a future's result: `cb` itself produces another
/// future, which this flattens into the result.
pub fn transform_async<T, R>(
    f: Future<T>,
    cb: impl FnOnce(T, Option<Error>) -> Future<R> + Send + 'static,
) -> Future<R>
where
    T: Clone + Default + Send + 'static,
    R: Clone + Default + Send + 'static,
{
    let promise = Promise::<R>::new();
    let future = promise.future();
    f.subscribe(move |val, err| {
        let inner = cb(val, err);
        inner.subscribe(move |rval, rerr| promise.set(rval, rerr));
    });
    future
}

/// The result of a [`race`]: which input won, its value, and its error (if
/// every input errored — see [`race`]'s doc for the two-level error shape).
#[derive(Debug, Clone)]
pub struct RaceResult<T> {
    /// Index of the input future that settled this race, or `-1` if `race`
    /// was given an empty slice.
    pub index: i64,
    pub value: T,
    pub error: Option<Error>,
}

impl<T: Default> Default for RaceResult<T> {
    fn default() -> Self {
        Self {
            index: -1,
            value: T::default(),
            error: None,
        }
    }
}

/// Settles with the first input to publish successfully. If every input
/// errors, settles successfully anyway with the *first* erroring input's
/// index/value/error folded into [`RaceResult`] — the outer future's own
/// error is always `None`; see DESIGN.md for why this two-level shape
/// ("the race itself completed" vs. "every racer failed") is preserved
/// rather than collapsed into a single opaque error.
pub fn race<T: Clone + Default + Send + 'static>(fs: Vec<Future<T>>) -> Future<RaceResult<T>> {
    if fs.is_empty() {
        return Future::done(RaceResult::default());
    }
    let n = fs.len();
    let promise = Promise::<RaceResult<T>>::new();
    let future = promise.future();

    let won = Arc::new(AtomicBool::new(false));
    let err_index = Arc::new(AtomicI64::new(-1));
    let err_count = Arc::new(AtomicUsize::new(0));
    let first_err = Arc::new(Mutex::new(None::<(T, Error)>));

    for (i, f) in fs.into_iter().enumerate() {
        let promise = promise.clone();
        let won = won.clone();
        let err_index = err_index.clone();
        let err_count = err_count.clone();
        let first_err = first_err.clone();
        f.subscribe(move |val, err| match err {
            None => {
                if !won.swap(true, Ordering::AcqRel) {
                    promise.set_safe(
                        RaceResult {
                            index: i as i64,
                            value: val,
                            error: None,
                        },
                        None,
                    );
                }
            }
            Some(e) => {
                if err_index
                    .compare_exchange(-1, i as i64, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    *first_err.lock().unwrap() = Some((val, e));
                }
                if err_count.fetch_add(1, Ordering::AcqRel) + 1 == n && !won.load(Ordering::Acquire)
                {
                    let idx = err_index.load(Ordering::Acquire);
                    let (v, e) = first_err.lock().unwrap().take().expect(
                        "err_index was set by the compare_exchange above before err_count reached n",
                    );
                    promise.set_safe(
                        RaceResult {
                            index: idx,
                            value: v,
                            error: Some(e),
                        },
                        None,
                    );
                }
            }
        });
    }
    future
}

/// Alias for [`race`] under the name of its "every input errored" branch;
/// that branch is already `race`'s own behavior rather than a second
/// algorithm, so this exists purely for name parity with callers who think
/// of the all-errors case as a distinct operation.
pub fn race_collect_on_all_err<T: Clone + Default + Send + 'static>(
    fs: Vec<Future<T>>,
) -> Future<RaceResult<T>> {
    race(fs)
}

/// Settles once every input has settled successfully, publishing the
/// collected values in input order; settles with the first error seen if
/// any input errors.
pub fn join_all<T: Clone + Default + Send + 'static>(fs: Vec<Future<T>>) -> Future<Vec<T>> {
    if fs.is_empty() {
        return Future::done(Vec::new());
    }
    let n = fs.len();
    let promise = Promise::<Vec<T>>::new();
    let future = promise.future();

    let slots: Arc<Mutex<Vec<Option<T>>>> = Arc::new(Mutex::new((0..n).map(|_| None).collect()));
    let remaining = Arc::new(AtomicUsize::new(n));
    let errored = Arc::new(AtomicBool::new(false));

    for (i, f) in fs.into_iter().enumerate() {
        let promise = promise.clone();
        let slots = slots.clone();
        let remaining = remaining.clone();
        let errored = errored.clone();
        f.subscribe(move |val, err| {
            if let Some(e) = err {
                if !errored.swap(true, Ordering::AcqRel) {
                    promise.set_safe(Vec::new(), Some(e));
                }
                return;
            }
            slots.lock().unwrap()[i] = Some(val);
            if remaining.fetch_sub(1, Ordering::AcqRel) == 1 && !errored.load(Ordering::Acquire) {
                let collected = slots
                    .lock()
                    .unwrap()
                    .iter_mut()
                    .map(|slot| slot.take().expect("every slot filled once remaining hits 0"))
                    .collect();
                promise.set_safe(collected, None);
            }
        });
    }
    future
}

/// Races `f` against a timer of `duration`. If `f` settles first, the timer
/// is woken early and never fires; otherwise the result settles with
/// [`Error::Timeout`].
pub fn timeout<T: Clone + Default + Send + 'static>(f: Future<T>, duration: Duration) -> Future<T> {
    let promise = Promise::<T>::new();
    let future = promise.future();
    let done = Arc::new(AtomicBool::new(false));
    let timer_wake = Arc::new((Mutex::new(false), Condvar::new()));

    let timer_promise = promise.clone();
    let timer_done = done.clone();
    let timer_wake_thread = timer_wake.clone();
    std::thread::spawn(move || {
        let (lock, cvar) = &*timer_wake_thread;
        let guard = lock.lock().unwrap();
        let _ = cvar.wait_timeout_while(guard, duration, |woken| !*woken).unwrap();
        if !timer_done.swap(true, Ordering::AcqRel) {
            timer_promise.set_safe(T::default(), Some(Error::Timeout));
        }
    });

    f.subscribe(move |val, err| {
        {
            let (lock, cvar) = &*timer_wake;
            *lock.lock().unwrap() = true;
            cvar.notify_all();
        }
        if !done.swap(true, Ordering::AcqRel) {
            promise.set_safe(val, err);
        }
    });
    future
}

/// [`timeout`] relative to an absolute [`Instant`].
pub fn deadline<T: Clone + Default + Send + 'static>(f: Future<T>, at: Instant) -> Future<T> {
    let duration = at.saturating_duration_since(Instant::now());
    timeout(f, duration)
}

//! The lock-free single-assignment [`Cell`] underlying every
//! [`Promise`](crate::Promise)/[`Future`](crate::Future) pair.
//!
//! A `Cell<T>` packs its STATE and WAITER_COUNT into one `AtomicU64` so a
//! publisher can learn, in a single CAS, exactly how many parked waiters it
//! must wake. Subscriber callbacks live on a Treiber stack (`AtomicPtr`
//! singly-linked LIFO), grounded on the transfer-stack shape used by
//! `cordyceps` — except here the publisher drains the whole stack instead of
//! handing it off, and pushing a node runs the push-then-double-check-DONE
//! protocol described below, since (unlike a plain transfer stack) a `Cell`
//! has a terminal state that races with concurrent pushes.
//!
//! No parking primitive in `std` gives N-to-N semaphore releases directly. A
//! `Mutex<()>` + `Condvar` pair, both guarded by the same status word waiters
//! observe, gives the identical externally-visible contract: every thread
//! parked before publication wakes after it, and none are lost.

use std::cell::UnsafeCell;
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};

use crate::error::Error;

const STATE_SHIFT: u32 = 32;
const STATE_MASK: u64 = 0b11 << STATE_SHIFT;
const LAZY_BIT: u64 = 1 << 63;
const WAITER_MASK: u64 = 0xFFFF_FFFF;

const STATE_FREE: u64 = 0;
const STATE_PUBLISHING: u64 = 1;
const STATE_DONE: u64 = 2;

#[inline]
fn state_of(word: u64) -> u64 {
    (word & STATE_MASK) >> STATE_SHIFT
}

#[inline]
fn waiters_of(word: u64) -> u32 {
    (word & WAITER_MASK) as u32
}

#[inline]
fn with_state(word: u64, state: u64) -> u64 {
    (word & !STATE_MASK) | (state << STATE_SHIFT)
}

#[inline]
fn is_lazy(word: u64) -> bool {
    word & LAZY_BIT != 0
}

type Producer<T> = Box<dyn FnOnce() -> (T, Option<Error>) + Send>;
type Callback<T> = Box<dyn FnOnce(T, Option<Error>) + Send>;

struct CallbackNode<T> {
    callback: Callback<T>,
    next: *mut CallbackNode<T>,
}

/// Single-assignment cell: see the module docs above for the publication,
/// blocking-read, and subscription protocols.
pub(crate) struct Cell<T> {
    status: AtomicU64,
    parker: Mutex<()>,
    condvar: Condvar,
    value: UnsafeCell<T>,
    error: UnsafeCell<Option<Error>>,
    producer: Mutex<Option<Producer<T>>>,
    callbacks: AtomicPtr<CallbackNode<T>>,
}

// Safety: `value`/`error` are written exactly once, by the single thread that
// wins the FREE->PUBLISHING CAS, and that write happens-before any other
// thread observes STATE_DONE (release/acquire on `status`). After DONE the
// slots are read-only. `callbacks` is a standard Treiber stack.
unsafe impl<T: Send> Send for Cell<T> {}
unsafe impl<T: Send> Sync for Cell<T> {}

impl<T: Clone + Default + Send + 'static> Cell<T> {
    pub(crate) fn new() -> Self {
        Self {
            status: AtomicU64::new(STATE_FREE),
            parker: Mutex::new(()),
            condvar: Condvar::new(),
            value: UnsafeCell::new(T::default()),
            error: UnsafeCell::new(None),
            producer: Mutex::new(None),
            callbacks: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub(crate) fn new_lazy(producer: Producer<T>) -> Self {
        Self {
            status: AtomicU64::new(STATE_FREE | LAZY_BIT),
            parker: Mutex::new(()),
            condvar: Condvar::new(),
            value: UnsafeCell::new(T::default()),
            error: UnsafeCell::new(None),
            producer: Mutex::new(Some(producer)),
            callbacks: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub(crate) fn is_free(&self) -> bool {
        state_of(self.status.load(Ordering::Acquire)) == STATE_FREE
    }

    pub(crate) fn is_done(&self) -> bool {
        state_of(self.status.load(Ordering::Acquire)) == STATE_DONE
    }

    /// Publishes `(val, err)`. Never blocks, never panics.
    pub(crate) fn set_safe(&self, val: T, err: Option<Error>) -> bool {
        loop {
            let s = self.status.load(Ordering::Acquire);
            if state_of(s) != STATE_FREE {
                return false;
            }
            let publishing = with_state(s, STATE_PUBLISHING);
            if self
                .status
                .compare_exchange(s, publishing, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }

            // Safety: we are the sole CAS winner out of FREE; no other
            // thread may write these slots until we advance to DONE below.
            unsafe {
                *self.value.get() = val;
                *self.error.get() = err;
            }

            let mut cur = publishing;
            let done_word = loop {
                let next = with_state(cur, STATE_DONE);
                match self
                    .status
                    .compare_exchange(cur, next, Ordering::AcqRel, Ordering::Acquire)
                {
                    Ok(_) => break next,
                    Err(actual) => cur = actual,
                }
            };

            // Release every thread that incremented WAITER_COUNT before we
            // observed it; Condvar::notify_all wakes them all regardless of
            // the exact count, which upholds "no parked waiter is lost"
            // even though we don't issue per-waiter releases.
            let _waiters = waiters_of(done_word);
            {
                let _guard = self.parker.lock().unwrap();
                self.condvar.notify_all();
            }

            self.drain_callbacks();
            return true;
        }
    }

    /// Strict `set`: panics on a second publication.
    pub(crate) fn set(&self, val: T, err: Option<Error>) {
        if !self.set_safe(val, err) {
            panic!("promise already satisfied");
        }
    }

    /// Blocks the calling thread until the cell is published, then returns it.
    pub(crate) fn get(&self) -> (T, Option<Error>) {
        if let Some((val, err)) = self.try_elect_lazy_producer() {
            return (val, err);
        }

        loop {
            let s = self.status.load(Ordering::Acquire);
            if state_of(s) == STATE_DONE {
                return self.read_done();
            }

            debug_assert!(
                waiters_of(s) != u32::MAX,
                "waiter count overflow (4 billion parked threads?)"
            );
            let bumped = s + 1;
            if self
                .status
                .compare_exchange_weak(s, bumped, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }

            let mut guard = self.parker.lock().unwrap();
            loop {
                if state_of(self.status.load(Ordering::Acquire)) == STATE_DONE {
                    break;
                }
                guard = self.condvar.wait(guard).unwrap();
            }
            drop(guard);
            return self.read_done();
        }
    }

    /// If this cell is lazy and not yet elected, try to become the elected
    /// reader that runs `producer` and publishes its result. Returns `None`
    /// if the cell isn't lazy (or lost the race and the winner is someone
    /// else) so the caller falls through to the normal blocking path.
    fn try_elect_lazy_producer(&self) -> Option<(T, Option<Error>)> {
        loop {
            let s = self.status.load(Ordering::Acquire);
            if !is_lazy(s) {
                return None;
            }
            let cleared = s & !LAZY_BIT;
            if self
                .status
                .compare_exchange(s, cleared, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let producer = self
                    .producer
                    .lock()
                    .unwrap()
                    .take()
                    .expect("lazy cell elected with no producer installed");
                let (val, err) = producer();
                self.set(val.clone(), err.clone());
                return Some((val, err));
            }
            // Lost the race (another field of `status` changed); reload and
            // recheck — if the lazy flag is now clear someone else won it.
        }
    }

    /// Safety: only valid once STATE_DONE has been observed with Acquire
    /// ordering, which happens-after the publishing writes.
    fn read_done(&self) -> (T, Option<Error>) {
        let value = unsafe { (*self.value.get()).clone() };
        let error = unsafe { (*self.error.get()).clone() };
        (value, error)
    }

    /// Subscribes `cb` to fire exactly once with the published result.
    pub(crate) fn subscribe(&self, cb: impl FnOnce(T, Option<Error>) + Send + 'static) {
        let cb: Callback<T> = Box::new(cb);

        if state_of(self.status.load(Ordering::Acquire)) == STATE_DONE {
            let (v, e) = self.read_done();
            cb(v, e);
            return;
        }

        let node = Box::into_raw(Box::new(CallbackNode {
            callback: cb,
            next: ptr::null_mut(),
        }));

        loop {
            let head = self.callbacks.load(Ordering::Acquire);
            // Safety: `node` was just allocated by us and is not yet shared.
            unsafe {
                (*node).next = head;
            }
            match self
                .callbacks
                .compare_exchange_weak(head, node, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(_) => continue,
            }
        }

        // Double-check: did the cell finish publishing while we were
        // pushing? If so, try to pop exactly our own node back off; if that
        // succeeds nobody else has a reference to it, so we must fire it
        // ourselves. If it fails, the publisher's drain already swept it (or
        // will), so it's their responsibility. See the module docs above for
        // why a plain check-then-push is not enough.
        if state_of(self.status.load(Ordering::Acquire)) == STATE_DONE {
            // Safety: `node` was pushed by us above and is still a valid
            // allocation unless something already popped it.
            let next = unsafe { (*node).next };
            if self
                .callbacks
                .compare_exchange(node, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                // Safety: we just won exclusive ownership of `node` back.
                let boxed = unsafe { Box::from_raw(node) };
                let (v, e) = self.read_done();
                (boxed.callback)(v, e);
            }
        }
    }

    /// Pop and invoke every pending callback. Loops until the stack is
    /// observed empty twice in a row's worth of effort: a fresh push landing
    /// mid-drain is picked up by re-swapping rather than left stranded.
    fn drain_callbacks(&self) {
        loop {
            let mut node = self.callbacks.swap(ptr::null_mut(), Ordering::AcqRel);
            if node.is_null() {
                return;
            }
            while !node.is_null() {
                // Safety: nodes on this stack were `Box::into_raw` and are
                // only ever reclaimed once, either here or in `subscribe`'s
                // double-check.
                let boxed = unsafe { Box::from_raw(node) };
                let next = boxed.next;
                let value = unsafe { (*self.value.get()).clone() };
                let error = unsafe { (*self.error.get()).clone() };
                (boxed.callback)(value, error);
                node = next;
            }
        }
    }
}

impl<T> Drop for Cell<T> {
    fn drop(&mut self) {
        // Any node still linked here was never fired (shouldn't happen in
        // correct usage, since DONE implies drained) — reclaim its memory
        // without invoking it, since we have no value that is sound to read
        // (this path only matters if the cell is dropped before publication,
        // in which case no callback was ever owed an invocation).
        let mut node = *self.callbacks.get_mut();
        while !node.is_null() {
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next;
        }
    }
}

impl<T> fmt::Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.status.load(Ordering::Relaxed);
        f.debug_struct("Cell")
            .field("state", &state_of(s))
            .field("waiters", &waiters_of(s))
            .field("lazy", &is_lazy(s))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn set_then_get_same_thread() {
        let cell: Cell<i32> = Cell::new();
        assert!(cell.set_safe(42, None));
        assert_eq!(cell.get(), (42, None));
    }

    #[test]
    fn second_set_safe_returns_false() {
        let cell: Cell<i32> = Cell::new();
        assert!(cell.set_safe(1, None));
        assert!(!cell.set_safe(2, None));
        assert_eq!(cell.get(), (1, None));
    }

    #[test]
    #[should_panic(expected = "already satisfied")]
    fn second_strict_set_panics() {
        let cell: Cell<i32> = Cell::new();
        cell.set(1, None);
        cell.set(2, None);
    }

    #[test]
    fn many_waiters_all_observe_same_value() {
        let cell = Arc::new(Cell::<i32>::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let cell = cell.clone();
            handles.push(thread::spawn(move || cell.get()));
        }
        // Give the waiters a moment to park before publishing.
        thread::sleep(std::time::Duration::from_millis(10));
        cell.set(7, None);
        for h in handles {
            assert_eq!(h.join().unwrap(), (7, None));
        }
    }

    #[test]
    fn subscribe_before_done_fires_from_publisher() {
        let cell = Arc::new(Cell::<i32>::new());
        let seen = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let seen = seen.clone();
            cell.subscribe(move |v, _| {
                seen.fetch_add(v as usize, Ordering::SeqCst);
            });
        }
        cell.set(5, None);
        assert_eq!(seen.load(Ordering::SeqCst), 40);
    }

    #[test]
    fn subscribe_after_done_fires_inline() {
        let cell: Cell<i32> = Cell::new();
        cell.set(9, None);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        cell.subscribe(move |v, _| seen2.store(v as usize, Ordering::SeqCst));
        assert_eq!(seen.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn subscribe_racing_publication_both_orderings() {
        // Exercise "subscribe completes before publish" and "publish
        // completes before subscribe" repeatedly; every callback must fire
        // exactly once either way.
        for _ in 0..500 {
            let cell = Arc::new(Cell::<i32>::new());
            let fired = Arc::new(AtomicUsize::new(0));

            let c1 = cell.clone();
            let f1 = fired.clone();
            let subscriber = thread::spawn(move || {
                c1.subscribe(move |_, _| {
                    f1.fetch_add(1, Ordering::SeqCst);
                });
            });
            let c2 = cell.clone();
            let publisher = thread::spawn(move || {
                c2.set_safe(1, None);
            });

            subscriber.join().unwrap();
            publisher.join().unwrap();
            assert_eq!(fired.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn lazy_producer_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let cell = Arc::new(Cell::new_lazy(Box::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            (99, None)
        })));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cell = cell.clone();
            handles.push(thread::spawn(move || cell.get()));
        }
        for h in handles {
            assert_eq!(h.join().unwrap(), (99, None));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscribe_does_not_trigger_lazy_producer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let cell = Cell::new_lazy(Box::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            (1, None)
        }));
        cell.subscribe(|_, _| {});
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

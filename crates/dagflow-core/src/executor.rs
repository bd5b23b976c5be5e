//! The [`Executor`] capability and the cooperative [`Context`].
//!
//! The executor is the only place the core introduces new concurrency;
//! everything else in `dagflow-core` is lock-free or semaphore/condvar-based.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};

/// A capability that runs a unit of work. `submit` must not block the
/// caller longer than strictly necessary and must never silently drop the
/// work.
pub trait Executor: Send + Sync {
    fn submit(&self, work: Box<dyn FnOnce() + Send>);
}

/// Default executor: spawns a fresh OS thread per submission — lightweight
/// execution without pooling or concurrency limits.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn submit(&self, work: Box<dyn FnOnce() + Send>) {
        std::thread::spawn(work);
    }
}

/// A bounded worker pool, for callers who want to cap concurrency or reuse
/// threads instead of spawning one per submission.
pub struct PoolExecutor {
    sender: Option<std::sync::mpsc::Sender<Box<dyn FnOnce() + Send>>>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl PoolExecutor {
    /// Spawns `workers` long-lived threads pulling from a shared queue.
    pub fn new(workers: usize) -> Self {
        let (sender, receiver) = std::sync::mpsc::channel::<Box<dyn FnOnce() + Send>>();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers.max(1) {
            let receiver = receiver.clone();
            handles.push(std::thread::spawn(move || {
                loop {
                    let job = {
                        let rx = receiver.lock().unwrap();
                        rx.recv()
                    };
                    match job {
                        Ok(job) => job(),
                        Err(_) => break,
                    }
                }
            }));
        }
        Self {
            sender: Some(sender),
            workers: handles,
        }
    }
}

impl Executor for PoolExecutor {
    fn submit(&self, work: Box<dyn FnOnce() + Send>) {
        // An unbounded mpsc sender never blocks the caller, satisfying
        // "must not block the caller longer than strictly necessary"; the
        // bound is on worker *count*, not queue depth.
        self.sender
            .as_ref()
            .expect("PoolExecutor used after drop")
            .send(work)
            .expect("PoolExecutor workers have all exited");
    }
}

impl Drop for PoolExecutor {
    fn drop(&mut self) {
        // Drop the sender first so workers' blocking `recv()` sees the
        // channel close and exit, instead of `join` deadlocking forever.
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl fmt::Debug for PoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolExecutor")
            .field("workers", &self.workers.len())
            .finish()
    }
}

use std::fmt;

static DEFAULT_EXECUTOR: OnceLock<Mutex<Arc<dyn Executor>>> = OnceLock::new();

fn default_executor_cell() -> &'static Mutex<Arc<dyn Executor>> {
    DEFAULT_EXECUTOR.get_or_init(|| Mutex::new(Arc::new(ThreadExecutor)))
}

/// Returns the process-wide default executor.
pub fn default_executor() -> Arc<dyn Executor> {
    default_executor_cell().lock().unwrap().clone()
}

/// Replaces the process-wide default executor.
///
/// Rust's type system makes a "null" `Arc<dyn Executor>` unrepresentable, so
/// the "must not accept a degenerate replacement" contract is enforced
/// structurally rather than at runtime (see DESIGN.md for this Open
/// Question's resolution).
pub fn set_default_executor(executor: Arc<dyn Executor>) {
    *default_executor_cell().lock().unwrap() = executor;
}

/// A cooperative cancellation flag shared across clones.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<CancellationState>,
}

#[derive(Default)]
struct CancellationState {
    cancelled: AtomicBool,
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Relaxed);
        let _guard = self.inner.mutex.lock().unwrap();
        self.inner.condvar.notify_all();
    }

    /// Blocks until cancelled. Useful for node bodies that want to sleep
    /// but wake early on cancellation instead of polling.
    pub fn wait(&self) {
        let mut guard = self.inner.mutex.lock().unwrap();
        while !self.is_cancelled() {
            guard = self.inner.condvar.wait(guard).unwrap();
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// An external collaborator carrying a cancellation signal and arbitrary
/// key/value payload, threaded through `submit_with_context` and into every
/// DAG node's runnable. The core never introspects the payload.
#[derive(Clone, Default)]
pub struct Context {
    cancellation: CancellationToken,
    values: Arc<HashMap<String, Arc<dyn std::any::Any + Send + Sync>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            values: Arc::new(HashMap::new()),
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns a copy of this context with one additional key/value entry.
    pub fn with_value(&self, key: impl Into<String>, value: Arc<dyn std::any::Any + Send + Sync>) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value);
        Self {
            cancellation: self.cancellation.clone(),
            values: Arc::new(values),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn std::any::Any + Send + Sync>> {
        self.values.get(key)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("keys", &self.values.len())
            .finish()
    }
}

//! # Worker Pool & Foreground Context (`common::process::dispatch`)
//!
//! File: cli/src/common/process/dispatch.rs
//!
//! ## Overview
//!
//! Asynchronous runs need two execution contexts:
//!
//! - **`WorkerPool`**: where the blocking work happens. It wraps a Tokio
//!   runtime and runs each job with `spawn_blocking`, so several runs can be
//!   blocked on their children at once.
//! - **`ForegroundContext`**: where completions are delivered. One dedicated
//!   thread drains a bounded channel of jobs, so completions never run
//!   concurrently with each other or with other foreground work.
//!
//! A [`Dispatcher`] is the cloneable sending side of the foreground channel.
//!
//! ## Shutdown
//!
//! Dropping a `WorkerPool` waits until every submitted job has finished.
//! The foreground thread keeps running until every `Dispatcher` is gone, so
//! [`ForegroundContext::join`] returns only after every completion that
//! could still be sent has run. A completion that panics is logged and does
//! not stop later ones.
//!
//! A pool dropped on the foreground thread cannot wait there: the workers it
//! would wait for may be parked on a full foreground queue. Such a pool is
//! marked with [`WorkerPool::release_in_background`] and hands the wait to a
//! short-lived `procrun-shutdown` thread instead.
//!
//! A `WorkerPool` that owns its runtime must not be dropped from inside an
//! async context; host applications already running Tokio should use
//! [`WorkerPool::from_handle`].
//!
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc;
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Count of submitted jobs that have not finished yet.
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        InFlightGuard(Arc::clone(self))
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = self
                .idle
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count -= 1;
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

/// Background pool for blocking runs.
pub struct WorkerPool {
    runtime: Option<Runtime>,
    handle: Handle,
    in_flight: Arc<InFlight>,
    release_in_background: bool,
}

impl WorkerPool {
    /// Builds a pool that owns its runtime.
    ///
    /// ## Arguments
    ///
    /// * `max_blocking_threads` - Upper bound on runs blocked at the same time.
    ///   Further submissions queue until a thread frees up. Zero is treated as one.
    ///
    /// ## Returns
    ///
    /// * `io::Result<Self>` - The pool, or the error from building the Tokio runtime.
    pub fn new(max_blocking_threads: usize) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(max_blocking_threads.max(1))
            .thread_name("procrun-worker")
            .build()?;
        let handle = runtime.handle().clone();
        debug!(
            "Started worker pool (max_blocking_threads={})",
            max_blocking_threads
        );
        Ok(Self {
            runtime: Some(runtime),
            handle,
            in_flight: Arc::default(),
            release_in_background: false,
        })
    }

    /// Uses a runtime owned by the host application.
    ///
    /// The host must keep that runtime alive until the pool has been dropped.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            runtime: None,
            handle,
            in_flight: Arc::default(),
            release_in_background: false,
        }
    }

    /// Runs `job` on a blocking worker thread. Returns immediately.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.in_flight.enter();
        // Detached: completion is reported by the job itself.
        drop(self.handle.spawn_blocking(move || {
            let _guard = guard;
            job();
        }));
    }

    /// Blocks until every submitted job has finished.
    pub fn wait_idle(&self) {
        self.in_flight.wait_idle();
    }

    /// Makes dropping this pool return at once. Jobs still in flight finish
    /// on their workers, and an owned runtime is shut down once they have.
    pub fn release_in_background(&mut self) {
        self.release_in_background = true;
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.release_in_background {
            self.wait_idle();
            if let Some(runtime) = self.runtime.take() {
                drop(runtime);
                debug!("Worker pool shut down");
            }
            return;
        }

        let in_flight = Arc::clone(&self.in_flight);
        let runtime = self.runtime.take();
        let spawned = thread::Builder::new()
            .name("procrun-shutdown".to_string())
            .spawn(move || {
                in_flight.wait_idle();
                drop(runtime);
                debug!("Worker pool shut down in background");
            });
        if let Err(e) = spawned {
            // The failed spawn already dropped the runtime on this thread.
            error!("Could not start worker pool shutdown thread: {}", e);
        }
    }
}

/// The single thread on which completions run.
///
/// Dropping the context without calling [`join`](Self::join) detaches the
/// thread; it still exits once the last `Dispatcher` is dropped.
pub struct ForegroundContext {
    sender: mpsc::Sender<Job>,
    thread: JoinHandle<()>,
}

impl ForegroundContext {
    /// Starts the foreground thread with a queue of `capacity` pending jobs.
    pub fn spawn(capacity: usize) -> io::Result<Self> {
        let (sender, mut receiver) = mpsc::channel::<Job>(capacity.max(1));
        let thread = thread::Builder::new()
            .name("procrun-foreground".to_string())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                        error!("Completion handler panicked: {}", panic_message(&*payload));
                    }
                }
                debug!("Foreground context drained");
            })?;
        Ok(Self { sender, thread })
    }

    /// A handle for delivering jobs onto this context.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            sender: self.sender.clone(),
            foreground: self.thread.thread().id(),
        }
    }

    /// Waits until every outstanding job has run and the thread has exited.
    ///
    /// Every `Dispatcher` (including those held by runners) must be dropped
    /// for this to return.
    pub fn join(self) -> thread::Result<()> {
        let Self { sender, thread } = self;
        drop(sender);
        thread.join()
    }
}

/// Sends jobs to a [`ForegroundContext`].
#[derive(Clone)]
pub struct Dispatcher {
    sender: mpsc::Sender<Job>,
    foreground: ThreadId,
}

impl Dispatcher {
    /// Queues `job` to run on the foreground thread, waiting for queue space.
    ///
    /// ## Arguments
    ///
    /// * `job` - Work to run on the foreground thread. A panic inside it is
    ///   caught and logged there.
    ///
    /// ## Behavior
    ///
    /// Blocks while the queue is full. If the foreground thread is gone the
    /// job is dropped and an error is logged.
    ///
    /// Must not be called from inside an async context, nor from the
    /// foreground thread itself while its queue is full.
    pub fn deliver<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.blocking_send(Box::new(job)).is_err() {
            error!("Foreground context is gone; completion could not be delivered");
        }
    }

    /// Whether the calling thread is the foreground thread.
    pub fn is_foreground(&self) -> bool {
        thread::current().id() == self.foreground
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

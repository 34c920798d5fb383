//! # Process Runner (`common::process::runner`)
//!
//! File: cli/src/common/process/runner.rs
//!
//! ## Overview
//!
//! `ProcessRunner` is the entry point host applications use. It offers:
//!
//! - **`run_direct`**: launch as the current user, capture stdout, block.
//! - **`run_elevated`**: launch through the configured privilege bridge, block.
//! - **`run`**: either of the above, chosen by a flag.
//! - **`run_async`**: either of the above on the worker pool, with the result
//!   handed to a completion on the foreground context exactly once.
//!
//! ## Async lifecycle
//!
//! Each async call gets a [`RunId`] and moves through [`RunPhase`]:
//! `Idle → Launched → Succeeded | Failed → CompletionDelivered`. Phase changes
//! are logged at debug level under the run's id. There is no cancellation and
//! no timeout: a child that never exits keeps its worker thread forever.
//! Completions of independent calls may arrive in any order. A run that
//! panics on its worker is still delivered, as [`RunError::Panicked`].
//!
//! Dropping the runner waits for in-flight runs, except on the foreground
//! thread itself (for example from inside a completion), where the wait is
//! handed off so the foreground queue keeps draining.
//!
//! ## Example
//!
//! ```rust,no_run
//! use procrun::{AbsolutePath, ForegroundContext, ProcessRunner};
//! use procrun::core::config::Config;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let foreground = ForegroundContext::spawn(config.workers.completion_queue)?;
//! let runner = ProcessRunner::new(&config, &foreground)?;
//!
//! let echo = AbsolutePath::new("/bin/echo")?;
//! let bytes = runner.run_direct(&echo, &["hello".to_string()])?;
//! assert_eq!(bytes, b"hello\n");
//!
//! runner.run_async(echo, vec!["later".into()], false, |result| {
//!     println!("{:?}", result.map(|b| String::from_utf8_lossy(&b).into_owned()));
//! });
//!
//! drop(runner); // waits for in-flight runs
//! foreground.join().expect("foreground thread panicked");
//! # Ok(())
//! # }
//! ```
//!
use super::bridge::{bridge_for, PrivilegeBridge};
use super::direct::run_direct;
use super::dispatch::{panic_message, Dispatcher, ForegroundContext, WorkerPool};
use super::elevated::run_elevated;
use super::output::OutputOptions;
use crate::common::path::AbsolutePath;
use crate::core::config::Config;
use crate::core::error::{RunError, RunResult};
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one asynchronous run in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(u64);

impl RunId {
    fn next() -> Self {
        RunId(NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Lifecycle of one asynchronous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Launched,
    Succeeded,
    Failed,
    /// Terminal.
    CompletionDelivered,
}

impl RunPhase {
    pub fn can_advance_to(self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Idle, Launched)
                | (Launched, Succeeded)
                | (Launched, Failed)
                | (Succeeded, CompletionDelivered)
                | (Failed, CompletionDelivered)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == RunPhase::CompletionDelivered
    }
}

struct RunTracker {
    id: RunId,
    phase: RunPhase,
}

impl RunTracker {
    fn new(id: RunId) -> Self {
        Self {
            id,
            phase: RunPhase::Idle,
        }
    }

    fn advance(&mut self, next: RunPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "{}: invalid transition {:?} -> {:?}",
            self.id,
            self.phase,
            next
        );
        debug!("{}: {:?} -> {:?}", self.id, self.phase, next);
        self.phase = next;
    }
}

/// The blocking half of the runner, shared with worker jobs.
struct Executor {
    output: OutputOptions,
    bridge: Arc<dyn PrivilegeBridge>,
}

impl Executor {
    fn run(&self, path: &AbsolutePath, args: &[String], elevated: bool) -> RunResult {
        if elevated {
            run_elevated(self.bridge.as_ref(), path, args)
        } else {
            run_direct(path, args, &self.output)
        }
    }
}

/// Launches executables directly or elevated, synchronously or not.
pub struct ProcessRunner {
    executor: Arc<Executor>,
    pool: WorkerPool,
    dispatcher: Dispatcher,
}

impl ProcessRunner {
    /// Builds a runner from configuration, delivering completions on `foreground`.
    pub fn new(config: &Config, foreground: &ForegroundContext) -> io::Result<Self> {
        Self::with_bridge(config, bridge_for(config.elevation.backend), foreground)
    }

    /// Like [`new`](Self::new) but with an explicit privilege bridge.
    pub fn with_bridge(
        config: &Config,
        bridge: Arc<dyn PrivilegeBridge>,
        foreground: &ForegroundContext,
    ) -> io::Result<Self> {
        let pool = WorkerPool::new(config.workers.max_blocking_threads)?;
        Ok(Self::from_parts(
            OutputOptions::from(&config.output),
            bridge,
            pool,
            foreground.dispatcher(),
        ))
    }

    /// Assembles a runner from already constructed parts.
    pub fn from_parts(
        output: OutputOptions,
        bridge: Arc<dyn PrivilegeBridge>,
        pool: WorkerPool,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            executor: Arc::new(Executor { output, bridge }),
            pool,
            dispatcher,
        }
    }

    /// Runs `path` as the current user, blocking until it exits.
    ///
    /// ## Returns
    ///
    /// * `Ok(bytes)` - Everything the child wrote to stdout.
    /// * `Err(RunError::Process)` - Non-zero exit or signal.
    /// * `Err(RunError::Launch | RunError::OutputSink)` - The run never started.
    pub fn run_direct(&self, path: &AbsolutePath, args: &[String]) -> RunResult {
        self.executor.run(path, args, false)
    }

    /// Runs `path` with administrator rights, blocking until the bridge returns.
    pub fn run_elevated(&self, path: &AbsolutePath, args: &[String]) -> RunResult {
        self.executor.run(path, args, true)
    }

    /// Runs `path` directly or elevated, blocking.
    pub fn run(&self, path: &AbsolutePath, args: &[String], elevated: bool) -> RunResult {
        self.executor.run(path, args, elevated)
    }

    /// Runs `path` on the worker pool and returns immediately.
    ///
    /// ## Arguments
    ///
    /// * `path` - Executable to launch.
    /// * `args` - Arguments, passed verbatim (direct) or quoted into one
    ///   command string (elevated).
    /// * `elevated` - Whether to go through the privilege bridge.
    /// * `completion` - Receives the result on the foreground context.
    ///
    /// ## Returns
    ///
    /// * `RunId` - The id this run is logged under.
    ///
    /// ## Behavior
    ///
    /// `completion` runs exactly once, on the foreground context, after the
    /// run has produced its result. A panic during the run is reported to
    /// `completion` as [`RunError::Panicked`]. The run cannot be cancelled.
    pub fn run_async<F>(
        &self,
        path: AbsolutePath,
        args: Vec<String>,
        elevated: bool,
        completion: F,
    ) -> RunId
    where
        F: FnOnce(RunResult) + Send + 'static,
    {
        let id = RunId::next();
        let executor = Arc::clone(&self.executor);
        let dispatcher = self.dispatcher.clone();
        let mut tracker = RunTracker::new(id);

        debug!(
            "{}: queued {} {:?} (elevated: {})",
            id, path, args, elevated
        );
        self.pool.submit(move || {
            tracker.advance(RunPhase::Launched);
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                executor.run(&path, &args, elevated)
            }))
            .unwrap_or_else(|payload| {
                let message = panic_message(&*payload);
                error!("{}: run panicked: {}", id, message);
                Err(RunError::Panicked { message })
            });
            tracker.advance(if result.is_ok() {
                RunPhase::Succeeded
            } else {
                RunPhase::Failed
            });
            dispatcher.deliver(move || {
                completion(result);
                tracker.advance(RunPhase::CompletionDelivered);
            });
        });
        id
    }

    /// Blocks until every async run issued so far has delivered its completion
    /// to the foreground queue.
    ///
    /// Returns `false` without waiting when called on the foreground thread,
    /// where waiting could never finish once the queue fills up.
    pub fn wait_idle(&self) -> bool {
        if self.dispatcher.is_foreground() {
            warn!("wait_idle called on the foreground thread; not waiting");
            return false;
        }
        self.pool.wait_idle();
        true
    }
}

impl Drop for ProcessRunner {
    fn drop(&mut self) {
        if self.dispatcher.is_foreground() {
            debug!("Runner dropped on the foreground thread; worker pool drains in background");
            self.pool.release_in_background();
        }
    }
}

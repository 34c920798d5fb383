//! # procrun
//!
//! File: cli/src/lib.rs
//!
//! ## Overview
//!
//! procrun lets a host application launch external executables, capture
//! their standard output, and learn whether they succeeded. Runs can block
//! the calling thread or execute on a worker pool with a completion delivered
//! on a designated foreground thread, and can optionally request
//! administrator rights through a platform privilege bridge.
//!
//! ## Architecture
//!
//! - `core`: configuration loading and error types.
//! - `common::path`: `AbsolutePath`.
//! - `common::process`: the runner, its output sink, bridges and dispatch.
//!
//! The most used items are re-exported at the crate root.
//!
pub mod common;
pub mod core;

pub use crate::common::path::AbsolutePath;
pub use crate::common::process::{
    Dispatcher, ForegroundContext, PrivilegeBridge, ProcessRunner, RunId, RunPhase, ScriptValue,
    WorkerPool,
};
pub use crate::core::error::{
    DiagnosticRecord, PrivilegeBridgeError, ProcessExecutionError, RunError, RunResult,
    TerminationReason,
};

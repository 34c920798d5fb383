//! # procrun Process Execution (`common::process`)
//!
//! File: cli/src/common/process/mod.rs
//!
//! ## Overview
//!
//! This module launches external executables and reports what they printed
//! or why they failed. Runs happen either directly (as the current user, no
//! shell) or elevated (through a privilege bridge that interprets one composed
//! shell command), and either on the calling thread or on a worker pool with
//! the result delivered to a foreground context.
//!
//! ## Architecture
//!
//! - **`output`**: `ScopedOutput`, the per-run temporary stdout sink.
//! - **`direct`**: spawn, wait, inspect exit status, read back the sink.
//! - **`bridge`**: the `PrivilegeBridge` trait and its osascript/pkexec backends.
//! - **`elevated`**: command composition and bridge result decoding.
//! - **`dispatch`**: `WorkerPool`, `ForegroundContext` and `Dispatcher`.
//! - **`runner`**: `ProcessRunner`, tying the above together.
//!
//! Every outcome is returned as a [`RunResult`](crate::core::error::RunResult);
//! nothing is thrown across the async boundary.
//!

/// Privilege-elevation bridges.
pub mod bridge;
/// Direct (unprivileged) execution.
pub mod direct;
/// Worker pool and foreground delivery context.
pub mod dispatch;
/// Elevated execution through a bridge.
pub mod elevated;
/// Scoped temporary stdout sink.
pub mod output;
/// The process runner.
pub mod runner;

pub use bridge::{bridge_for, AppleScriptBridge, PkexecBridge, PrivilegeBridge, ScriptValue};
pub use dispatch::{Dispatcher, ForegroundContext, WorkerPool};
pub use output::{OutputOptions, ScopedOutput};
pub use runner::{ProcessRunner, RunId, RunPhase};

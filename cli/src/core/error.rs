//! # procrun Error Types
//!
//! File: cli/src/core/error.rs
//!
//! ## Overview
//!
//! This module defines the error types used throughout procrun. Library
//! operations return typed errors so a host application can match on the
//! failure kind; application-level code (configuration loading, the CLI)
//! uses `anyhow` for context-rich propagation.
//!
//! ## Architecture
//!
//! The error system consists of:
//! - `RunError`: every way a single run can fail. It is the error half of
//!   [`RunResult`], the value handed back by every runner operation.
//! - `ProcessExecutionError`: a directly launched child exited non-zero or was
//!   killed by a signal.
//! - `PrivilegeBridgeError`: the privilege-elevation bridge itself failed
//!   (cancelled prompt, bad credentials, script fault).
//! - `RunError::Panicked`: an async run panicked on its worker; the panic is
//!   still reported to the completion rather than lost.
//! - `ProcrunError`: configuration and CLI failures.
//! - `Result<T>`: alias for `anyhow::Result<T>`.
//!
//! ## Examples
//!
//! ```rust
//! use procrun::core::error::{RunError, TerminationReason};
//!
//! # fn inspect(result: procrun::RunResult) {
//! match result {
//!     Ok(bytes) => println!("{} bytes captured", bytes.len()),
//!     Err(RunError::Process(e)) if e.reason == TerminationReason::UncaughtSignal => {
//!         eprintln!("killed by signal {}", e.exit_code);
//!     }
//!     Err(e) => eprintln!("run failed: {e}"),
//! }
//! # }
//! ```
//!
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Opaque diagnostic record reported by a privilege-elevation bridge.
///
/// Keys and values are backend-specific and are passed through untouched.
pub type DiagnosticRecord = BTreeMap<String, serde_json::Value>;

/// Raw bytes captured from a run, or the reason the run failed.
pub type RunResult = std::result::Result<Vec<u8>, RunError>;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationReason {
    /// The process called `exit` (or returned from `main`).
    Exited,
    /// The process was terminated by a signal it did not handle.
    UncaughtSignal,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Exited => f.write_str("exited"),
            TerminationReason::UncaughtSignal => f.write_str("uncaught signal"),
        }
    }
}

/// A directly launched child did not exit cleanly.
///
/// For [`TerminationReason::UncaughtSignal`], `exit_code` holds the signal number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("process terminated ({reason}) with code {exit_code}")]
pub struct ProcessExecutionError {
    pub exit_code: i32,
    pub reason: TerminationReason,
}

/// The privilege-elevation bridge reported a failure.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("privilege bridge failed: {}", describe_details(.details))]
pub struct PrivilegeBridgeError {
    pub details: DiagnosticRecord,
}

fn describe_details(details: &DiagnosticRecord) -> String {
    match details.get("message").and_then(|v| v.as_str()) {
        Some(message) => message.to_string(),
        None if details.is_empty() => "no diagnostics reported".to_string(),
        None => serde_json::Value::Object(
            details
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
        .to_string(),
    }
}

/// Every way a single run can fail.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Process(#[from] ProcessExecutionError),

    #[error(transparent)]
    PrivilegeBridge(#[from] PrivilegeBridgeError),

    /// The executable could not be spawned or waited on.
    #[error("failed to launch '{}': {source}", .path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The temporary stdout sink could not be created.
    #[error("failed to create output sink: {source}")]
    OutputSink {
        #[source]
        source: std::io::Error,
    },

    /// The run panicked on its worker thread before producing a result.
    #[error("run panicked: {message}")]
    Panicked { message: String },
}

/// Configuration and host-application errors.
#[derive(Error, Debug)]
pub enum ProcrunError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Type alias for Result using anyhow::Error for application-level code.
pub type Result<T> = anyhow::Result<T>;

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_process_error_display() {
        let err = ProcessExecutionError {
            exit_code: 1,
            reason: TerminationReason::Exited,
        };
        assert_eq!(err.to_string(), "process terminated (exited) with code 1");

        let run_err: RunError = err.into();
        assert_eq!(run_err.to_string(), "process terminated (exited) with code 1");
    }

    #[test]
    fn test_bridge_error_prefers_message() {
        let mut details = DiagnosticRecord::new();
        details.insert("message".into(), json!("User canceled."));
        details.insert("number".into(), json!(-128));
        let err = PrivilegeBridgeError { details };
        assert_eq!(err.to_string(), "privilege bridge failed: User canceled.");
    }

    #[test]
    fn test_bridge_error_without_details() {
        let err = PrivilegeBridgeError {
            details: DiagnosticRecord::new(),
        };
        assert_eq!(
            err.to_string(),
            "privilege bridge failed: no diagnostics reported"
        );
    }

    #[test]
    fn test_panicked_display() {
        let err = RunError::Panicked {
            message: "bridge blew up".into(),
        };
        assert_eq!(err.to_string(), "run panicked: bridge blew up");
    }

    #[test]
    fn test_config_error_display() {
        let err = ProcrunError::Config("completion_queue must be at least 1".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: completion_queue must be at least 1"
        );
    }
}

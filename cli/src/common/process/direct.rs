//! # Direct Execution (`common::process::direct`)
//!
//! File: cli/src/common/process/direct.rs
//!
//! ## Overview
//!
//! Launches an executable under the current user's privileges, with its
//! arguments passed through untouched (no shell), and blocks until it exits.
//!
//! ## Workflow
//!
//! 1. Create a [`ScopedOutput`] sink and bind the child's stdout to it.
//! 2. Spawn the child and wait for it.
//! 3. Non-zero exit or signal: release the sink, return `ProcessExecutionError`.
//! 4. Exit zero: rewind, read all bytes, release the sink, return them.
//!
//! A read failure in step 4 is logged and yields an empty payload rather than
//! an error. Standard input and standard error are inherited from the host.
//!
use super::output::{OutputOptions, ScopedOutput};
use crate::common::path::AbsolutePath;
use crate::core::error::{ProcessExecutionError, RunError, RunResult, TerminationReason};
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};
use tracing::{debug, warn};

/// Runs `path` with `args` and returns its captured standard output.
pub fn run_direct(path: &AbsolutePath, args: &[String], options: &OutputOptions) -> RunResult {
    let mut output =
        ScopedOutput::create(options).map_err(|source| RunError::OutputSink { source })?;
    let launch_error = |source| RunError::Launch {
        path: path.as_path().to_path_buf(),
        source,
    };

    debug!("Launching {} {:?}", path, args);
    let status = {
        let stdout = output
            .stdout()
            .map_err(|source| RunError::OutputSink { source })?;
        let mut command = Command::new(path.as_path());
        command.args(args).stdout(stdout);
        let mut child = command.spawn().map_err(launch_error)?;
        child.wait().map_err(launch_error)?
    };
    debug!("{} finished with {}", path, status);

    if let Some(error) = termination_error(status) {
        output.release();
        return Err(error.into());
    }

    let read = output.read_back();
    let bytes = captured_or_empty(path, output.path(), read);
    output.release();
    Ok(bytes)
}

/// The bytes read back from a sink, or nothing if the read failed.
fn captured_or_empty(path: &AbsolutePath, sink: &Path, read: io::Result<Vec<u8>>) -> Vec<u8> {
    read.unwrap_or_else(|e| {
        warn!(
            "Could not read captured output of {} from {}: {}. Returning empty output.",
            path,
            sink.display(),
            e
        );
        Vec::new()
    })
}

/// Maps an exit status to an error unless it is a clean zero exit.
///
/// A signal-terminated child reports the signal number as its exit code.
pub fn termination_error(status: ExitStatus) -> Option<ProcessExecutionError> {
    if let Some(code) = status.code() {
        return (code != 0).then_some(ProcessExecutionError {
            exit_code: code,
            reason: TerminationReason::Exited,
        });
    }

    #[cfg(unix)]
    let exit_code = {
        use std::os::unix::process::ExitStatusExt;
        status.signal().unwrap_or(-1)
    };
    #[cfg(not(unix))]
    let exit_code = -1;

    Some(ProcessExecutionError {
        exit_code,
        reason: TerminationReason::UncaughtSignal,
    })
}

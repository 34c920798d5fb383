//! # Privilege Bridges (`common::process::bridge`)
//!
//! File: cli/src/common/process/bridge.rs
//!
//! ## Overview
//!
//! Elevated runs do not spawn the executable themselves. They hand one
//! composed shell command to a platform mechanism that prompts for
//! administrator rights and runs it. That mechanism sits behind the
//! [`PrivilegeBridge`] trait so command construction and result decoding can
//! be exercised with a substitute backend.
//!
//! ## Backends
//!
//! - **`AppleScriptBridge`** (macOS): `osascript -e 'do shell script "<cmd>"
//!   with administrator privileges'`. The command is spliced into the script
//!   source without escaping, so a `"` inside it breaks the script.
//! - **`PkexecBridge`** (Linux): `pkexec /bin/sh -c <cmd>`. Only pkexec's own
//!   failure codes count as bridge failures.
//!
//! A bridge reports failure as a [`DiagnosticRecord`]; success is a
//! [`ScriptValue`], which may or may not have a string representation.
//!
use crate::core::config::ElevationBackend;
use crate::core::error::DiagnosticRecord;
use serde_json::json;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;
use tracing::{debug, warn};

/// pkexec: the authentication dialog was dismissed.
const PKEXEC_DISMISSED: i32 = 126;
/// pkexec: the user is not authorized (or authentication failed).
const PKEXEC_NOT_AUTHORIZED: i32 = 127;

/// The value a bridge returns after running a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptValue {
    string_value: Option<String>,
}

impl ScriptValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            string_value: Some(value.into()),
        }
    }

    /// A value with no string representation.
    pub fn none() -> Self {
        Self { string_value: None }
    }

    pub fn string_value(&self) -> Option<&str> {
        self.string_value.as_deref()
    }

    /// UTF-8 bytes of the string representation, empty when there is none.
    pub fn into_bytes(self) -> Vec<u8> {
        self.string_value.unwrap_or_default().into_bytes()
    }
}

/// Runs a composed shell command with administrator rights.
pub trait PrivilegeBridge: Send + Sync {
    /// Submits `command` for elevated execution.
    ///
    /// # Errors
    ///
    /// Returns the bridge's diagnostic record when the bridge itself fails:
    /// the prompt was cancelled, credentials were rejected, or the script
    /// could not be run. The command's own exit status is not a bridge failure.
    fn submit(&self, command: &str) -> Result<ScriptValue, DiagnosticRecord>;
}

/// Builds the AppleScript source that runs `command` as administrator.
pub fn applescript_source(command: &str) -> String {
    format!("do shell script \"{command}\" with administrator privileges")
}

/// Elevation through AppleScript's `do shell script`.
#[derive(Debug, Clone)]
pub struct AppleScriptBridge {
    osascript: PathBuf,
}

impl Default for AppleScriptBridge {
    fn default() -> Self {
        Self {
            osascript: PathBuf::from("/usr/bin/osascript"),
        }
    }
}

impl AppleScriptBridge {
    /// Uses `osascript` in place of `/usr/bin/osascript`. It is invoked as
    /// `<osascript> -e <source>`.
    pub fn with_interpreter(osascript: impl Into<PathBuf>) -> Self {
        Self {
            osascript: osascript.into(),
        }
    }
}

impl PrivilegeBridge for AppleScriptBridge {
    fn submit(&self, command: &str) -> Result<ScriptValue, DiagnosticRecord> {
        let source = applescript_source(command);
        debug!("Submitting AppleScript: {}", source);
        let output = Command::new(&self.osascript)
            .arg("-e")
            .arg(&source)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_failure(&self.osascript, e))?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let value = stdout.strip_suffix('\n').unwrap_or(&stdout);
            Ok(ScriptValue::text(value))
        } else {
            let record = osascript_diagnostics(&output);
            warn!("osascript reported an error: {:?}", record);
            Err(record)
        }
    }
}

/// Elevation through polkit's `pkexec`.
#[derive(Debug, Clone)]
pub struct PkexecBridge {
    pkexec: PathBuf,
    shell: PathBuf,
}

impl Default for PkexecBridge {
    fn default() -> Self {
        Self {
            pkexec: PathBuf::from("pkexec"),
            shell: PathBuf::from("/bin/sh"),
        }
    }
}

impl PkexecBridge {
    pub fn with_programs(pkexec: impl Into<PathBuf>, shell: impl Into<PathBuf>) -> Self {
        Self {
            pkexec: pkexec.into(),
            shell: shell.into(),
        }
    }
}

impl PrivilegeBridge for PkexecBridge {
    fn submit(&self, command: &str) -> Result<ScriptValue, DiagnosticRecord> {
        debug!("Submitting to pkexec: {}", command);
        let output = Command::new(&self.pkexec)
            .arg(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_failure(&self.pkexec, e))?;

        match output.status.code() {
            Some(code @ (PKEXEC_DISMISSED | PKEXEC_NOT_AUTHORIZED)) => {
                let record = pkexec_diagnostics(code, &output);
                warn!("pkexec refused elevation: {:?}", record);
                Err(record)
            }
            _ => Ok(ScriptValue::text(
                String::from_utf8_lossy(&output.stdout).into_owned(),
            )),
        }
    }
}

/// Picks the production bridge for `backend`.
pub fn bridge_for(backend: ElevationBackend) -> Arc<dyn PrivilegeBridge> {
    match backend {
        ElevationBackend::Osascript => Arc::new(AppleScriptBridge::default()),
        ElevationBackend::Pkexec => Arc::new(PkexecBridge::default()),
        ElevationBackend::Auto if cfg!(target_os = "macos") => {
            Arc::new(AppleScriptBridge::default())
        }
        ElevationBackend::Auto => Arc::new(PkexecBridge::default()),
    }
}

fn spawn_failure(program: &std::path::Path, error: io::Error) -> DiagnosticRecord {
    let mut record = DiagnosticRecord::new();
    record.insert(
        "message".into(),
        json!(format!("failed to launch {}: {}", program.display(), error)),
    );
    record.insert("os_error".into(), json!(error.raw_os_error()));
    record
}

/// Splits a trailing ` (-128)` style error number off an osascript message.
fn split_error_number(line: &str) -> (&str, Option<i64>) {
    if let Some((body, number)) = line
        .strip_suffix(')')
        .and_then(|stripped| stripped.rsplit_once(" ("))
    {
        if let Ok(number) = number.parse::<i64>() {
            return (body, Some(number));
        }
    }
    (line, None)
}

/// Parses osascript's stderr, e.g. `0:42: execution error: User canceled. (-128)`.
fn parse_osascript_error(stderr: &str) -> DiagnosticRecord {
    let line = stderr.trim();
    let (body, number) = split_error_number(line);
    let message = body
        .split_once("error: ")
        .map_or(body, |(_, message)| message)
        .trim();

    let mut record = DiagnosticRecord::new();
    record.insert("message".into(), json!(message));
    if let Some(number) = number {
        record.insert("number".into(), json!(number));
    }
    record.insert("stderr".into(), json!(line));
    record
}

fn osascript_diagnostics(output: &Output) -> DiagnosticRecord {
    let mut record = parse_osascript_error(&String::from_utf8_lossy(&output.stderr));
    record.insert("exit_status".into(), json!(output.status.code()));
    record
}

fn pkexec_diagnostics(code: i32, output: &Output) -> DiagnosticRecord {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if !stderr.is_empty() {
        stderr.clone()
    } else if code == PKEXEC_DISMISSED {
        "authentication dialog was dismissed".to_string()
    } else {
        "not authorized".to_string()
    };
    let mut record = DiagnosticRecord::new();
    record.insert("message".into(), json!(message));
    record.insert("exit_status".into(), json!(code));
    record.insert("stderr".into(), json!(stderr));
    record
}

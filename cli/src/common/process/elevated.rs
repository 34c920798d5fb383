//! # Elevated Execution (`common::process::elevated`)
//!
//! File: cli/src/common/process/elevated.rs
//!
//! ## Overview
//!
//! Builds one shell command string from an executable path and its
//! arguments, then submits it through a [`PrivilegeBridge`].
//!
//! Each argument is wrapped in single quotes and the results are joined with
//! spaces. Quotes inside an argument are **not** escaped, so `it's` yields
//! `'it's'` and the shell sees a different argument list. This is a known
//! limitation.
//!
//! Success means only that the bridge did not fail. Whether the command
//! itself exited zero is never checked; its textual result becomes the
//! payload as-is.
//!
use super::bridge::PrivilegeBridge;
use crate::common::path::AbsolutePath;
use crate::core::error::{PrivilegeBridgeError, RunResult};
use tracing::debug;

/// Joins `path` and single-quoted `args` into one shell command.
pub fn compose_command(path: &AbsolutePath, args: &[String]) -> String {
    let all_arguments = args
        .iter()
        .map(|arg| format!("'{arg}'"))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{} {}", path.file_system_path(), all_arguments)
}

/// Runs `path` with `args` through `bridge` with administrator rights.
pub fn run_elevated(bridge: &dyn PrivilegeBridge, path: &AbsolutePath, args: &[String]) -> RunResult {
    let command = compose_command(path, args);
    debug!("Requesting elevation for: {}", command);
    match bridge.submit(&command) {
        Ok(value) => Ok(value.into_bytes()),
        Err(details) => Err(PrivilegeBridgeError { details }.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::process::bridge::ScriptValue;
    use crate::core::error::{DiagnosticRecord, RunError};
    use serde_json::json;
    use std::sync::Mutex;

    struct Scripted {
        submitted: Mutex<Vec<String>>,
        reply: Result<ScriptValue, DiagnosticRecord>,
    }

    impl Scripted {
        fn replying(reply: Result<ScriptValue, DiagnosticRecord>) -> Self {
            Self {
                submitted: Mutex::new(Vec::new()),
                reply,
            }
        }
    }

    impl PrivilegeBridge for Scripted {
        fn submit(&self, command: &str) -> Result<ScriptValue, DiagnosticRecord> {
            self.submitted.lock().unwrap().push(command.to_string());
            self.reply.clone()
        }
    }

    fn abs(p: &str) -> AbsolutePath {
        AbsolutePath::new(p).unwrap()
    }

    #[test]
    fn test_compose_quotes_each_argument() {
        let args = vec!["-la".to_string(), "/private/var".to_string()];
        assert_eq!(
            compose_command(&abs("/bin/ls"), &args),
            "/bin/ls '-la' '/private/var'"
        );
    }

    #[test]
    fn test_compose_without_arguments_keeps_trailing_space() {
        assert_eq!(compose_command(&abs("/usr/bin/id"), &[]), "/usr/bin/id ");
    }

    #[test]
    fn test_compose_does_not_escape_single_quotes() {
        let args = vec!["it's".to_string()];
        let command = compose_command(&abs("/bin/echo"), &args);
        assert_eq!(command, "/bin/echo 'it's'");
        assert!(!command.contains("'it'\\''s'"));
    }

    #[test]
    fn test_success_encodes_string_value() {
        let bridge = Scripted::replying(Ok(ScriptValue::text("uid=0(root)")));
        let bytes = run_elevated(&bridge, &abs("/usr/bin/id"), &[]).unwrap();
        assert_eq!(bytes, b"uid=0(root)");
        assert_eq!(*bridge.submitted.lock().unwrap(), vec!["/usr/bin/id "]);
    }

    #[test]
    fn test_value_without_string_is_empty_success() {
        let bridge = Scripted::replying(Ok(ScriptValue::none()));
        let bytes = run_elevated(&bridge, &abs("/usr/bin/true"), &[]).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_bridge_failure_carries_record_unmodified() {
        let mut details = DiagnosticRecord::new();
        details.insert("message".into(), json!("User canceled."));
        details.insert("number".into(), json!(-128));
        let bridge = Scripted::replying(Err(details.clone()));

        let err = run_elevated(&bridge, &abs("/sbin/reboot"), &[]).unwrap_err();
        match err {
            RunError::PrivilegeBridge(e) => assert_eq!(e.details, details),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

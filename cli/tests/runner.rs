//! # procrun Runner Integration Tests
//!
//! File: cli/tests/runner.rs
//!
//! ## Overview
//!
//! Exercises `ProcessRunner` through the library API: direct runs against
//! real executables, elevated runs against substitute privilege bridges, and
//! asynchronous runs delivered on the foreground context.
//!

mod common;
use common::*;
use procrun::core::config::Config;
use procrun::{
    AbsolutePath, DiagnosticRecord, ForegroundContext, PrivilegeBridge, ProcessRunner, RunError,
    RunResult, ScriptValue, TerminationReason,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

const WAIT: Duration = Duration::from_secs(10);

/// Records submitted commands and answers with the command text.
#[derive(Default)]
struct RecordingBridge {
    submitted: Mutex<Vec<String>>,
}

impl PrivilegeBridge for RecordingBridge {
    fn submit(&self, command: &str) -> Result<ScriptValue, DiagnosticRecord> {
        self.submitted.lock().unwrap().push(command.to_string());
        Ok(ScriptValue::text(command))
    }
}

fn abs(path: &str) -> AbsolutePath {
    AbsolutePath::new(path).unwrap()
}

#[cfg(unix)]
#[test]
fn test_direct_echo_captures_stdout() {
    let sinks = tempdir().unwrap();
    let foreground = ForegroundContext::spawn(4).unwrap();
    let runner = ProcessRunner::new(&config_with_sink_dir(sinks.path()), &foreground).unwrap();

    let bytes = runner
        .run_direct(&abs("/bin/echo"), &["hello".to_string()])
        .unwrap();
    assert_eq!(bytes, b"hello\n");
    assert_eq!(entries_in(sinks.path()), 0);
}

#[cfg(unix)]
#[test]
fn test_direct_false_reports_exit_code() {
    let sinks = tempdir().unwrap();
    let foreground = ForegroundContext::spawn(4).unwrap();
    let runner = ProcessRunner::new(&config_with_sink_dir(sinks.path()), &foreground).unwrap();

    match runner.run_direct(&abs("/bin/false"), &[]) {
        Err(RunError::Process(e)) => {
            assert_eq!(e.exit_code, 1);
            assert_eq!(e.reason, TerminationReason::Exited);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(entries_in(sinks.path()), 0);
}

#[cfg(unix)]
#[test]
fn test_direct_exit_codes_match() {
    let sinks = tempdir().unwrap();
    let foreground = ForegroundContext::spawn(4).unwrap();
    let runner = ProcessRunner::new(&config_with_sink_dir(sinks.path()), &foreground).unwrap();

    for code in [2, 42, 255] {
        let args = vec!["-c".to_string(), format!("exit {code}")];
        match runner.run_direct(&abs("/bin/sh"), &args) {
            Err(RunError::Process(e)) => assert_eq!(e.exit_code, code),
            other => panic!("unexpected result for {code}: {other:?}"),
        }
    }
    assert_eq!(entries_in(sinks.path()), 0);
}

#[cfg(unix)]
#[test]
fn test_direct_binary_output_is_exact() {
    let sinks = tempdir().unwrap();
    let foreground = ForegroundContext::spawn(4).unwrap();
    let runner = ProcessRunner::new(&config_with_sink_dir(sinks.path()), &foreground).unwrap();

    let args = vec!["-c".to_string(), "printf 'a\\000b\\377'".to_string()];
    let bytes = runner.run_direct(&abs("/bin/sh"), &args).unwrap();
    assert_eq!(bytes, vec![b'a', 0, b'b', 0xff]);
}

#[test]
fn test_elevated_command_keeps_broken_quoting() {
    let foreground = ForegroundContext::spawn(4).unwrap();
    let bridge = Arc::new(RecordingBridge::default());
    let runner =
        ProcessRunner::with_bridge(&Default::default(), bridge.clone(), &foreground).unwrap();

    let bytes = runner
        .run_elevated(&abs("/bin/echo"), &["it's".to_string(), "fine".to_string()])
        .unwrap();
    assert_eq!(bytes, b"/bin/echo 'it's' 'fine'");
    assert_eq!(
        *bridge.submitted.lock().unwrap(),
        vec!["/bin/echo 'it's' 'fine'".to_string()]
    );
}

#[cfg(unix)]
#[test]
fn test_async_delivers_exactly_once_for_each_branch() {
    let sinks = tempdir().unwrap();
    let foreground = ForegroundContext::spawn(2).unwrap();
    let runner = ProcessRunner::with_bridge(
        &config_with_sink_dir(sinks.path()),
        Arc::new(RecordingBridge::default()),
        &foreground,
    )
    .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let cases: Vec<(&str, Vec<String>, bool)> = vec![
        ("/bin/echo", vec!["ok".into()], false),
        ("/bin/false", vec![], false),
        ("/nonexistent/procrun-missing", vec![], false),
        ("/usr/bin/id", vec![], true),
    ];
    for (path, args, elevated) in cases {
        let calls = Arc::clone(&calls);
        let outcomes = Arc::clone(&outcomes);
        runner.run_async(abs(path), args, elevated, move |result: RunResult| {
            calls.fetch_add(1, Ordering::SeqCst);
            outcomes.lock().unwrap().push(result.is_ok());
        });
    }

    drop(runner);
    foreground.join().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 2);
    assert_eq!(entries_in(sinks.path()), 0);
}

#[test]
fn test_async_completion_follows_result() {
    struct Flagging(Arc<AtomicBool>);

    impl PrivilegeBridge for Flagging {
        fn submit(&self, _command: &str) -> Result<ScriptValue, DiagnosticRecord> {
            std::thread::sleep(Duration::from_millis(50));
            self.0.store(true, Ordering::SeqCst);
            Ok(ScriptValue::none())
        }
    }

    let finished = Arc::new(AtomicBool::new(false));
    let foreground = ForegroundContext::spawn(4).unwrap();
    let runner = ProcessRunner::with_bridge(
        &Default::default(),
        Arc::new(Flagging(Arc::clone(&finished))),
        &foreground,
    )
    .unwrap();

    let (tx, rx) = mpsc::channel();
    let seen = Arc::clone(&finished);
    runner.run_async(abs("/usr/bin/true"), vec![], true, move |result| {
        tx.send((seen.load(Ordering::SeqCst), result.is_ok())).unwrap();
    });
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), (true, true));

    drop(runner);
    foreground.join().unwrap();
}

#[test]
fn test_async_completions_may_arrive_out_of_launch_order() {
    /// Holds "first" until "second" has been delivered.
    struct Gated {
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl PrivilegeBridge for Gated {
        fn submit(&self, command: &str) -> Result<ScriptValue, DiagnosticRecord> {
            if command.contains("first") {
                self.release.lock().unwrap().recv_timeout(WAIT).unwrap();
            }
            Ok(ScriptValue::text(command))
        }
    }

    let (release_tx, release_rx) = mpsc::channel();
    let foreground = ForegroundContext::spawn(4).unwrap();
    let runner = ProcessRunner::with_bridge(
        &Default::default(),
        Arc::new(Gated {
            release: Mutex::new(release_rx),
        }),
        &foreground,
    )
    .unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    let first_done = done_tx.clone();
    runner.run_async(abs("/bin/echo"), vec!["first".into()], true, move |_| {
        first_done.send("first").unwrap();
    });
    runner.run_async(abs("/bin/echo"), vec!["second".into()], true, move |_| {
        done_tx.send("second").unwrap();
        release_tx.send(()).unwrap();
    });

    let delivered: Vec<&str> = (0..2).map(|_| done_rx.recv_timeout(WAIT).unwrap()).collect();
    let unique: HashSet<&str> = delivered.iter().copied().collect();
    assert_eq!(unique, HashSet::from(["first", "second"]));
    // Launch order was first, second; delivery order here is the reverse.
    assert_eq!(delivered, vec!["second", "first"]);

    drop(runner);
    foreground.join().unwrap();
}

#[cfg(unix)]
#[test]
fn test_runner_dropped_inside_completion_does_not_stall_foreground() {
    let mut config = Config::default();
    config.workers.completion_queue = 1;
    let foreground = ForegroundContext::spawn(config.workers.completion_queue).unwrap();
    let shared = Arc::new(Mutex::new(Some(
        ProcessRunner::new(&config, &foreground).unwrap(),
    )));
    let delivered = Arc::new(AtomicUsize::new(0));
    let (quit_tx, quit_rx) = mpsc::channel();

    {
        let guard = shared.lock().unwrap();
        let runner = guard.as_ref().unwrap();

        let slot = Arc::clone(&shared);
        let count = Arc::clone(&delivered);
        runner.run_async(abs("/bin/echo"), vec!["quit".into()], false, move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            let runner = slot.lock().unwrap().take();
            drop(runner);
            quit_tx.send(()).unwrap();
        });
        for _ in 0..4 {
            let count = Arc::clone(&delivered);
            runner.run_async(abs("/bin/echo"), vec![], false, move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
    }

    quit_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("dropping the runner on the foreground thread stalled");
    foreground.join().unwrap();
    assert_eq!(delivered.load(Ordering::SeqCst), 5);
    assert!(shared.lock().unwrap().is_none());
}

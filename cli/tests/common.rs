//! # procrun Integration Test Common Helpers
//!
//! File: cli/tests/common.rs
//!
//! ## Overview
//!
//! Shared helpers for the integration test crates in `cli/tests/`: a builder
//! for the compiled `procrun` binary and a few fixtures for the library API.
//!

// Different test files use different helpers.
#![allow(dead_code)]

pub use assert_cmd::Command;
use procrun::core::config::{Config, OutputConfig};
use std::path::Path;

/// An `assert_cmd::Command` for the compiled `procrun` binary.
///
/// The working directory is a fresh temp dir so no project `.procrun.toml`
/// from the source tree is picked up.
pub fn procrun_cmd(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("procrun").expect("Failed to find procrun binary for testing");
    cmd.current_dir(cwd);
    cmd
}

/// A configuration whose output sinks are created in `dir`.
pub fn config_with_sink_dir(dir: &Path) -> Config {
    Config {
        output: OutputConfig {
            temp_dir: Some(dir.to_string_lossy().into_owned()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Number of entries currently in `dir`.
pub fn entries_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).expect("read sink dir").count()
}

//! # procrun Command Modules
//!
//! File: cli/src/commands/mod.rs
//!
//! ## Overview
//!
//! This module aggregates the subcommands of the `procrun` binary, a thin
//! host application over the library.
//!
//! ## Commands
//!
//! - `run`: launch an executable (optionally elevated and/or async) and print
//!   its captured standard output
//! - `config`: print the effective configuration
//!
//! Each command defines its own arguments structure and handler function.
//!

/// `procrun config`: show the merged configuration.
pub mod config;
/// `procrun run`: launch an executable through the process runner.
pub mod run;

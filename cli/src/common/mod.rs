//! # procrun Common Utilities (`common`)
//!
//! File: cli/src/common/mod.rs
//!
//! ## Overview
//!
//! Shared building blocks consumed by host applications and by the
//! `procrun` binary's commands:
//!
//! - **`path`**: `AbsolutePath`, the validated path type the runner accepts,
//!   plus a few pure path helpers.
//! - **`process`**: the process runner and everything it is built from.
//!

/// Validated absolute paths and path helpers.
pub mod path;
/// Launching external executables, directly or elevated, sync or async.
pub mod process;

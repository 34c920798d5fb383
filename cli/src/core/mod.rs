//! # procrun Core Infrastructure
//!
//! File: cli/src/core/mod.rs
//!
//! ## Overview
//!
//! Foundational pieces shared by the library and the binary:
//! - `config`: configuration loading, merging, and validation
//! - `error`: error types and the `RunResult` alias
//!
pub mod config;
pub mod error;

//! # procrun Config Command
//!
//! File: cli/src/commands/config.rs
//!
//! ## Overview
//!
//! Implements `procrun config`, which prints the configuration after user and
//! project files have been merged, expanded and validated, in TOML form.
//!
//! ```bash
//! procrun config
//! ```
//!
use anyhow::Context;
use clap::Parser;
use procrun::core::config::Config;
use procrun::core::error::Result;

/// Arguments for `procrun config` (none yet).
#[derive(Parser, Debug)]
#[command(about = "Print the effective configuration")]
pub struct ConfigArgs {}

/// Renders `config` as TOML.
pub fn render_config(config: &Config) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize configuration")
}

pub fn handle_config(_args: ConfigArgs, config: &Config) -> Result<()> {
    print!("{}", render_config(config)?);
    Ok(())
}

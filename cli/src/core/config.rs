//! # procrun Configuration System
//!
//! File: cli/src/core/config.rs
//!
//! ## Overview
//!
//! This module implements the configuration system for procrun, handling
//! loading, merging, validation, and access to configuration data. It supports
//! a multi-level approach that combines defaults, user settings, and
//! project-specific overrides.
//!
//! ## Architecture
//!
//! Configuration sources (in order of precedence):
//! 1. Project-specific `.procrun.toml` in current directory or ancestors
//! 2. User-specific `config.toml` in the platform config directory
//! 3. Default values defined in the code
//!
//! Sections:
//! - `[output]`: where the per-run stdout sink files are created
//! - `[workers]`: background pool and completion queue sizing
//! - `[elevation]`: which privilege bridge backend to use
//!
//! ## Examples
//!
//! ```toml
//! [output]
//! temp_dir = "~/.cache/procrun"
//! prefix = "run-"
//!
//! [workers]
//! max_blocking_threads = 4
//! completion_queue = 32
//!
//! [elevation]
//! backend = "pkexec"
//! ```
//!
use crate::core::error::{ProcrunError, Result};
use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Represents the main configuration structure, loaded from TOML files.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub elevation: ElevationConfig,
}

/// Where the temporary stdout sinks of direct runs are created.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory for sink files (can use ~). `None` means the system temp dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<String>,
    /// File name prefix for sink files.
    #[serde(default = "default_output_prefix")]
    pub prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            prefix: default_output_prefix(),
        }
    }
}

/// Sizing of the background pool and the foreground completion queue.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Upper bound on concurrently blocked runs.
    #[serde(default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,
    /// Capacity of the channel feeding completions to the foreground thread.
    #[serde(default = "default_completion_queue")]
    pub completion_queue: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_blocking_threads: default_max_blocking_threads(),
            completion_queue: default_completion_queue(),
        }
    }
}

/// Privilege bridge selection.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ElevationConfig {
    #[serde(default)]
    pub backend: ElevationBackend,
}

/// Which mechanism is used to obtain administrator rights.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ElevationBackend {
    /// `osascript` on macOS, `pkexec` elsewhere.
    #[default]
    Auto,
    /// AppleScript `do shell script ... with administrator privileges`.
    Osascript,
    /// polkit's `pkexec`.
    Pkexec,
}

fn default_output_prefix() -> String {
    "procrun-".to_string()
}
fn default_max_blocking_threads() -> usize {
    16
}
fn default_completion_queue() -> usize {
    64
}

const PROJECT_CONFIG_FILENAME: &str = ".procrun.toml";

/// Loads, merges, expands and validates the effective configuration for the
/// current working directory.
pub fn load_config() -> Result<Config> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    load_config_for(&cwd, user_config_path().as_deref())
}

/// Loads the configuration seen from `start`.
///
/// ## Arguments
///
/// * `start` - Directory the project `.procrun.toml` search begins in.
/// * `user_file` - The user-level `config.toml`, if one should be consulted.
///   A path that does not exist is skipped.
///
/// ## Returns
///
/// * `Result<Config>` - Defaults, overlaid by the user file, overlaid by the
///   project file, with `~` expanded. Errors if a file is unreadable, is not
///   valid TOML, or fails validation.
pub fn load_config_for(start: &Path, user_file: Option<&Path>) -> Result<Config> {
    let user = read_layer("user", user_file.filter(|path| path.is_file()))?;
    let project = read_layer("project", find_project_config_path(start).as_deref())?;

    let mut config = merge_configs(user.unwrap_or_default(), project);
    expand_config_paths(&mut config).context("Failed to expand paths in configuration")?;
    validate_config(&config).context("Configuration validation failed")?;
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn user_config_path() -> Option<PathBuf> {
    match ProjectDirs::from("com", "Procrun", "procrun") {
        Some(dirs) => Some(dirs.config_dir().join("config.toml")),
        None => {
            warn!("Could not determine user config directory.");
            None
        }
    }
}

fn read_layer(layer: &str, path: Option<&Path>) -> Result<Option<Config>> {
    match path {
        Some(path) => {
            info!("Loading {} configuration from {}", layer, path.display());
            load_config_from_path(path).map(Some)
        }
        None => {
            debug!("No {} configuration file found", layer);
            Ok(None)
        }
    }
}

/// Walks up from `start` looking for `.procrun.toml`, stopping at a `.git` directory.
fn find_project_config_path(start: &Path) -> Option<PathBuf> {
    let mut path = start;
    loop {
        let project_config = path.join(PROJECT_CONFIG_FILENAME);
        if project_config.is_file() {
            return Some(project_config);
        }
        if path.join(".git").is_dir() {
            debug!(
                "Found .git directory at {}, stopping project config search.",
                path.display()
            );
            return None;
        }
        path = path.parent()?;
    }
}

fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

fn merge_configs(user: Config, project: Option<Config>) -> Config {
    let project_cfg = match project {
        Some(p) => p,
        None => return user,
    };
    let mut merged = Config::default();
    merged.output.temp_dir = project_cfg.output.temp_dir.or(user.output.temp_dir);
    merged.output.prefix = if project_cfg.output.prefix != default_output_prefix() {
        project_cfg.output.prefix
    } else {
        user.output.prefix
    };
    merged.workers.max_blocking_threads =
        if project_cfg.workers.max_blocking_threads != default_max_blocking_threads() {
            project_cfg.workers.max_blocking_threads
        } else {
            user.workers.max_blocking_threads
        };
    merged.workers.completion_queue =
        if project_cfg.workers.completion_queue != default_completion_queue() {
            project_cfg.workers.completion_queue
        } else {
            user.workers.completion_queue
        };
    merged.elevation.backend = if project_cfg.elevation.backend != ElevationBackend::Auto {
        project_cfg.elevation.backend
    } else {
        user.elevation.backend
    };
    merged
}

fn expand_config_paths(config: &mut Config) -> Result<()> {
    if let Some(dir) = config.output.temp_dir.as_mut() {
        *dir = shellexpand::tilde(dir.as_str()).into_owned();
        debug!("Expanded output temp_dir: {}", dir);
    }
    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    if let Some(dir) = &config.output.temp_dir {
        let dir = PathBuf::from(dir);
        if !dir.is_absolute() {
            return Err(anyhow!(ProcrunError::Config(format!(
                "Configured output temp_dir '{}' must be an absolute path.",
                dir.display()
            ))));
        }
        if !dir.exists() {
            warn!(
                "Configured output temp_dir '{}' does not exist.",
                dir.display()
            );
        } else if !dir.is_dir() {
            return Err(anyhow!(ProcrunError::Config(format!(
                "Configured output temp_dir '{}' exists but is not a directory.",
                dir.display()
            ))));
        }
    }
    if config.output.prefix.contains(std::path::MAIN_SEPARATOR) {
        return Err(anyhow!(ProcrunError::Config(format!(
            "Output prefix '{}' must not contain a path separator.",
            config.output.prefix
        ))));
    }
    if config.workers.max_blocking_threads == 0 {
        return Err(anyhow!(ProcrunError::Config(
            "workers.max_blocking_threads must be at least 1.".to_string()
        )));
    }
    if config.workers.completion_queue == 0 {
        return Err(anyhow!(ProcrunError::Config(
            "workers.completion_queue must be at least 1.".to_string()
        )));
    }
    Ok(())
}

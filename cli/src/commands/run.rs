//! # procrun Run Command
//!
//! File: cli/src/commands/run.rs
//!
//! ## Overview
//!
//! Implements `procrun run`, which launches an executable through
//! [`ProcessRunner`] and writes its captured standard output to this
//! process's standard output.
//!
//! ## Architecture
//!
//! 1. Validate the executable path as an `AbsolutePath`.
//! 2. Start a `ForegroundContext` and a `ProcessRunner` from configuration.
//! 3. Run synchronously, or with `--async` dispatch to the worker pool and
//!    wait for the completion, which runs on the foreground thread.
//! 4. Shut down the runner and foreground thread, then report the result.
//!
//! ## Usage
//!
//! ```bash
//! procrun run /bin/echo hello
//! procrun run --async /bin/ls -- -la /tmp
//! procrun run --elevated /usr/bin/id
//! ```
//!
use anyhow::{anyhow, Context};
use clap::Parser;
use procrun::core::config::Config;
use procrun::core::error::Result;
use procrun::{AbsolutePath, ForegroundContext, ProcessRunner};
use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc;
use tracing::{info, warn};

/// Arguments accepted by `procrun run`.
#[derive(Parser, Debug)]
#[command(about = "Run an executable and print its captured standard output")]
pub struct RunArgs {
    /// Request administrator rights through the configured privilege bridge.
    #[arg(long)]
    elevated: bool,

    /// Run on the worker pool and receive the result as a completion.
    #[arg(long = "async")]
    run_async: bool,

    /// Absolute path of the executable to launch.
    path: PathBuf,

    /// Arguments passed to the executable as-is.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

pub fn handle_run(args: RunArgs, config: &Config) -> Result<()> {
    let path = AbsolutePath::new(&args.path)?;
    info!(
        "Running {} {:?} (elevated: {}, async: {})",
        path, args.args, args.elevated, args.run_async
    );

    let foreground = ForegroundContext::spawn(config.workers.completion_queue)
        .context("Failed to start foreground context")?;
    let runner =
        ProcessRunner::new(config, &foreground).context("Failed to start worker pool")?;

    let result = if args.run_async {
        let (tx, rx) = mpsc::channel();
        let id = runner.run_async(path.clone(), args.args, args.elevated, move |result| {
            if tx.send(result).is_err() {
                warn!("Result of async run arrived after the command stopped waiting");
            }
        });
        info!("Dispatched {}", id);
        rx.recv().context("Completion was never delivered")?
    } else {
        runner.run(&path, &args.args, args.elevated)
    };

    drop(runner);
    foreground
        .join()
        .map_err(|_| anyhow!("Foreground context panicked"))?;

    let bytes = result.with_context(|| format!("Failed to run {}", path))?;
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&bytes)
        .and_then(|()| stdout.flush())
        .context("Failed to write captured output")?;
    Ok(())
}

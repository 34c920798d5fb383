//! # Scoped Output Sink (`common::process::output`)
//!
//! File: cli/src/common/process/output.rs
//!
//! ## Overview
//!
//! A direct run binds the child's standard output to a fresh, uniquely named
//! temporary file rather than a pipe. Once the child exits the runner seeks
//! back to the start and reads everything that was written.
//!
//! `ScopedOutput` owns that file for exactly one run. It is closed and removed
//! when the run finishes: explicitly via [`ScopedOutput::release`] on the
//! normal paths, and by `Drop` on early returns and unwinding.
//!
use crate::core::config::OutputConfig;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Where sink files are created and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOptions {
    /// Directory for sink files; the system temp dir when `None`.
    pub dir: Option<PathBuf>,
    pub prefix: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self::from(&OutputConfig::default())
    }
}

impl From<&OutputConfig> for OutputOptions {
    fn from(config: &OutputConfig) -> Self {
        Self {
            dir: config.temp_dir.as_ref().map(PathBuf::from),
            prefix: config.prefix.clone(),
        }
    }
}

/// Temporary stdout sink for one direct run.
#[derive(Debug)]
pub struct ScopedOutput {
    file: NamedTempFile,
}

impl ScopedOutput {
    /// Creates a new, empty sink file.
    pub fn create(options: &OutputOptions) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&options.prefix).suffix(".txt");
        let file = match &options.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        debug!("Created output sink {}", file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// A second handle to the sink, suitable for a child's stdout.
    ///
    /// The handle shares the file offset with the sink, so the child's writes
    /// leave it positioned at the end.
    pub fn stdout(&self) -> io::Result<Stdio> {
        let handle: File = self.file.as_file().try_clone()?;
        Ok(Stdio::from(handle))
    }

    /// Rewinds and reads everything written so far.
    pub fn read_back(&mut self) -> io::Result<Vec<u8>> {
        let file = self.file.as_file_mut();
        file.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Closes the handle and deletes the backing file.
    pub fn release(self) {
        let path = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => debug!("Released output sink {}", path.display()),
            Err(e) => warn!("Failed to remove output sink {}: {}", path.display(), e),
        }
    }
}

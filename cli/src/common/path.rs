//! # procrun Absolute Paths (`common::path`)
//!
//! File: cli/src/common/path.rs
//!
//! ## Overview
//!
//! `AbsolutePath` is the validated path type accepted by the process runner.
//! It guarantees the path is non-relative; it does **not** check that the file
//! exists or is executable. That is the caller's responsibility, and a bad
//! path surfaces later as `RunError::Launch`.
//!
//! Besides construction it offers a few pure helpers used by host
//! applications when deriving executable locations:
//! - **`parent`**: the containing directory, if any.
//! - **`contains`**: whether another path is this one or lies beneath it.
//! - **`removing_components`**: trims a matching suffix of path components.
//!
use crate::core::error::ProcrunError;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A validated, non-relative filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbsolutePath(PathBuf);

impl AbsolutePath {
    /// Wraps `path`, rejecting empty and relative paths.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ProcrunError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(ProcrunError::InvalidPath("path is empty".to_string()));
        }
        if !path.is_absolute() {
            return Err(ProcrunError::InvalidPath(format!(
                "'{}' is not an absolute path",
                path.display()
            )));
        }
        Ok(Self(path))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// The path as a string, lossily converted for non-UTF-8 components.
    pub fn file_system_path(&self) -> String {
        self.0.to_string_lossy().into_owned()
    }

    /// The containing directory, or `None` for the filesystem root.
    pub fn parent(&self) -> Option<AbsolutePath> {
        self.0.parent().map(|p| AbsolutePath(p.to_path_buf()))
    }

    /// Returns true if `other` is this path or lies somewhere beneath it.
    ///
    /// Both sides are canonicalized when they exist on disk so that symlinks
    /// and `..` segments resolve; otherwise the comparison is lexical.
    pub fn contains(&self, other: &AbsolutePath) -> bool {
        match (self.0.canonicalize(), other.0.canonicalize()) {
            (Ok(this), Ok(that)) => that.starts_with(this),
            _ => normalize(&other.0).starts_with(normalize(&self.0)),
        }
    }

    /// Pops trailing components while they match the trailing entries of
    /// `components`, stopping at the first mismatch.
    ///
    /// `/a/b/c` removing `["b", "c"]` is `/a`; removing `["x", "c"]` is `/a/b`.
    /// The root is never removed.
    pub fn removing_components<S: AsRef<OsStr>>(&self, components: &[S]) -> AbsolutePath {
        let mut remaining: Vec<Component<'_>> = self.0.components().collect();
        for want in components.iter().rev() {
            let want: &OsStr = want.as_ref();
            match remaining.last() {
                Some(Component::Normal(last)) if *last == want => {}
                _ => break,
            }
            remaining.pop();
        }

        AbsolutePath(remaining.iter().collect())
    }
}

/// Resolves `.` and `..` lexically.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl AsRef<Path> for AbsolutePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl TryFrom<&str> for AbsolutePath {
    type Error = ProcrunError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        AbsolutePath::new(value)
    }
}

impl TryFrom<PathBuf> for AbsolutePath {
    type Error = ProcrunError;

    fn try_from(value: PathBuf) -> Result<Self, Self::Error> {
        AbsolutePath::new(value)
    }
}

impl fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

//! Subjects: the long-lived entities tasks act on.

use std::fmt;
use std::path::{Path, PathBuf};

/// Something a task acts on, e.g. one monitored certificate file.
///
/// Subjects are owned by a registry that outlives any task context. The
/// boundary only ever reads their textual representation.
pub trait Subject: fmt::Display + fmt::Debug + Send + Sync {
    /// Path of the cached OCSP staple derived from this subject.
    fn staple_path(&self) -> PathBuf {
        PathBuf::from(format!("{self}.ocsp"))
    }
}

/// A certificate file on disk, identified by its path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CertSubject {
    path: PathBuf,
}

impl CertSubject {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for CertSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl Subject for CertSubject {}

//! Forensic dump: stack traces of unclassified failures.
//!
//! Each dump is a new file named after the time the failing attempt started.
//! The file is opened, written and closed within `TraceWriter::write`; the
//! handle is released on every path, including a failed write.

use std::backtrace::Backtrace;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::TaskFailure;

/// How many `-N` suffixes to try when a trace file name is already taken.
const MAX_NAME_ATTEMPTS: u32 = 100;

#[derive(Debug, Error)]
pub enum TraceDumpError {
    #[error("can't determine working directory: {0}")]
    WorkingDir(#[source] io::Error),

    #[error("{}: {}", .path.display(), .source)]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes stack trace files for unclassified failures.
#[derive(Debug, Clone)]
pub struct TraceWriter {
    /// `None` = the process's current working directory, resolved per dump.
    dir: Option<PathBuf>,
    prefix: String,
}

impl TraceWriter {
    pub fn new(dir: Option<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir,
            prefix: prefix.into(),
        }
    }

    /// `<prefix><YYYYmmdd-HHMMSSffffff>.trace`
    pub fn file_name(&self, started_at: DateTime<Utc>) -> String {
        format!("{}{}.trace", self.prefix, started_at.format("%Y%m%d-%H%M%S%6f"))
    }

    fn dir(&self) -> Result<PathBuf, TraceDumpError> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().map_err(TraceDumpError::WorkingDir),
        }
    }

    /// Path the next dump for `started_at` would be written to, ignoring
    /// collisions.
    pub fn target(&self, started_at: DateTime<Utc>) -> Result<PathBuf, TraceDumpError> {
        Ok(self.dir()?.join(self.file_name(started_at)))
    }

    /// Dump `failure` and return the path of the new trace file.
    ///
    /// The backtrace recorded in the failure is used when it has one,
    /// otherwise one is captured here.
    pub fn write(
        &self,
        context: &str,
        failure: &TaskFailure,
        started_at: DateTime<Utc>,
    ) -> Result<PathBuf, TraceDumpError> {
        let path = self.target(started_at)?;
        let (mut file, path) = create_unique(&path)?;

        let written = write_trace(&mut file, context, failure, started_at)
            .and_then(|()| file.flush());
        drop(file);

        keep_or_discard(path, written)
    }
}

/// A trace that could not be written completely is removed, so a failed dump
/// never leaves a partial file behind.
fn keep_or_discard(path: PathBuf, written: io::Result<()>) -> Result<PathBuf, TraceDumpError> {
    match written {
        Ok(()) => Ok(path),
        Err(source) => {
            let _ = std::fs::remove_file(&path);
            Err(TraceDumpError::Write { path, source })
        }
    }
}

/// Create `path`, or `path` with a `-N` suffix when the name is taken.
fn create_unique(path: &Path) -> Result<(File, PathBuf), TraceDumpError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut candidate = path.to_path_buf();
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((file, candidate)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                candidate = path.with_file_name(format!("{stem}-{attempt}.trace"));
            }
            Err(source) => {
                return Err(TraceDumpError::Write {
                    path: candidate,
                    source,
                });
            }
        }
    }
    Err(TraceDumpError::Write {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::AlreadyExists, "no free trace file name"),
    })
}

fn write_trace(
    out: &mut impl Write,
    context: &str,
    failure: &TaskFailure,
    started_at: DateTime<Utc>,
) -> io::Result<()> {
    writeln!(out, "failure: {failure}")?;
    writeln!(out, "context: {context}")?;
    writeln!(out, "started: {}", started_at.to_rfc3339())?;
    if let Some(location) = failure.panic_location() {
        writeln!(out, "panicked at: {location}")?;
    }
    let mut source = std::error::Error::source(failure);
    while let Some(cause) = source {
        writeln!(out, "caused by: {cause}")?;
        source = cause.source();
    }
    writeln!(out)?;
    match failure.backtrace() {
        Some(backtrace) => writeln!(out, "{backtrace}"),
        None => writeln!(out, "{}", Backtrace::force_capture()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UnclassifiedFailure;
    use chrono::TimeZone;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ocspd-trace-{}", ulid::Ulid::new()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap() + chrono::Duration::microseconds(42)
    }

    #[test]
    fn file_name_uses_prefix_and_timestamp() {
        let writer = TraceWriter::new(None, "ocspd_exception");
        assert_eq!(
            writer.file_name(started()),
            "ocspd_exception20240506-070809000042.trace"
        );
    }

    #[test]
    fn writes_failure_context_and_backtrace() {
        let dir = scratch_dir();
        let writer = TraceWriter::new(Some(dir.clone()), "ocspd_exception");
        let failure = TaskFailure::from(UnclassifiedFailure::new("index out of range"));

        let path = writer.write("parse task-x for /c.pem", &failure, started()).unwrap();

        assert_eq!(path.parent(), Some(dir.as_path()));
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("failure: index out of range\n"));
        assert!(body.contains("context: parse task-x for /c.pem"));
        assert!(body.lines().count() > 4);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn colliding_names_get_a_suffix() {
        let dir = scratch_dir();
        let writer = TraceWriter::new(Some(dir.clone()), "ocspd_exception");
        let failure = TaskFailure::from(UnclassifiedFailure::new("again"));

        let first = writer.write("ctx", &failure, started()).unwrap();
        let second = writer.write("ctx", &failure, started()).unwrap();

        assert_ne!(first, second);
        assert_eq!(
            second.file_name().unwrap().to_string_lossy(),
            "ocspd_exception20240506-070809000042-1.trace"
        );
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 2);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn default_target_is_current_working_directory() {
        let writer = TraceWriter::new(None, "ocspd_exception");
        let target = writer.target(started()).unwrap();

        assert_eq!(target.parent(), Some(std::env::current_dir().unwrap().as_path()));
        assert_eq!(
            target.file_name().unwrap().to_string_lossy(),
            "ocspd_exception20240506-070809000042.trace"
        );
    }

    #[test]
    fn failed_write_removes_partial_trace() {
        let dir = scratch_dir();
        let path = dir.join("ocspd_exception-partial.trace");
        std::fs::write(&path, b"failure: half").unwrap();

        let err = keep_or_discard(path.clone(), Err(io::Error::other("disk full"))).unwrap_err();

        assert!(matches!(err, TraceDumpError::Write { .. }));
        assert!(err.to_string().ends_with("disk full"));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn completed_write_keeps_trace() {
        let dir = scratch_dir();
        let path = dir.join("ocspd_exception-done.trace");
        std::fs::write(&path, b"failure: whole").unwrap();

        assert_eq!(keep_or_discard(path.clone(), Ok(())).unwrap(), path);
        assert!(path.exists());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_directory_reports_write_error() {
        let dir = std::env::temp_dir()
            .join(format!("ocspd-missing-{}", ulid::Ulid::new()))
            .join("nested");
        let writer = TraceWriter::new(Some(dir), "ocspd_exception");

        let err = writer
            .write("ctx", &UnclassifiedFailure::new("x").into(), started())
            .unwrap_err();
        assert!(matches!(err, TraceDumpError::Write { .. }));
    }
}

//! Failure taxonomy for task actions.
//!
//! Every collaborator (cert parsing, chain validation, OCSP fetching, renewal)
//! reports failures as a `TaskFailure`. The supervision boundary dispatches on
//! the variant with a single `match`; anything the collaborators could not
//! classify ends up in `Unclassified` and is dumped for post-hoc diagnosis.

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A failure raised by a task action.
#[derive(Debug, Error)]
pub enum TaskFailure {
    /// The subject's backing file could not be read.
    #[error("can't access {}: {}", .path.display(), .reason)]
    ResourceAccess { path: PathBuf, reason: String },

    /// The OCSP responder sent something we could not use.
    #[error("bad OCSP response: {0}")]
    BadResponse(String),

    /// The OCSP responder rejected the renewal.
    #[error("OCSP renewal failed: {0}")]
    RenewalProtocol(String),

    /// Something needed for renewal (issuer, OCSP URL, ...) is missing.
    #[error("renewal requirement missing: {0}")]
    MissingRequirement(String),

    #[error("certificate validation failed: {0}")]
    Validation(String),

    #[error("certificate parsing failed: {0}")]
    Parsing(String),

    /// Low level network failure (DNS, socket, ...).
    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    TooManyRedirects(String),

    #[error("received bad HTTP status {status} from OCSP server {url}")]
    BadStatus { status: u16, url: String },

    /// Connection level failure (refused, reset, TLS handshake, ...).
    #[error("{0}")]
    Connection(String),

    #[error(transparent)]
    Unclassified(#[from] UnclassifiedFailure),
}

impl TaskFailure {
    /// Build a resource-access failure from the I/O error that caused it.
    pub fn resource_access(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::ResourceAccess {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ResourceAccess { .. } => FailureKind::ResourceAccess,
            Self::BadResponse(_) => FailureKind::BadResponse,
            Self::RenewalProtocol(_) => FailureKind::RenewalProtocol,
            Self::MissingRequirement(_) => FailureKind::MissingRequirement,
            Self::Validation(_) => FailureKind::Validation,
            Self::Parsing(_) => FailureKind::Parsing,
            Self::Transport(_) => FailureKind::Transport,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::TooManyRedirects(_) => FailureKind::TooManyRedirects,
            Self::BadStatus { .. } => FailureKind::BadStatus,
            Self::Connection(_) => FailureKind::Connection,
            Self::Unclassified(_) => FailureKind::Unclassified,
        }
    }

    /// Textual signature used to detect repeated occurrences of the same
    /// failure.
    pub fn signature(&self) -> String {
        self.to_string()
    }

    /// Source location of a panic, if this failure came from one.
    pub fn panic_location(&self) -> Option<&str> {
        match self {
            Self::Unclassified(inner) => inner.location(),
            _ => None,
        }
    }

    /// Backtrace captured at the failure site, if the variant carries one.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            Self::Unclassified(inner) => Some(inner.backtrace()),
            _ => None,
        }
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for TaskFailure {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Unclassified(UnclassifiedFailure::from_error(err))
    }
}

/// Discriminant of [`TaskFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    ResourceAccess,
    BadResponse,
    RenewalProtocol,
    MissingRequirement,
    Validation,
    Parsing,
    Transport,
    Timeout,
    TooManyRedirects,
    BadStatus,
    Connection,
    Unclassified,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResourceAccess => "resource_access",
            Self::BadResponse => "bad_response",
            Self::RenewalProtocol => "renewal_protocol",
            Self::MissingRequirement => "missing_requirement",
            Self::Validation => "validation",
            Self::Parsing => "parsing",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::TooManyRedirects => "too_many_redirects",
            Self::BadStatus => "bad_status",
            Self::Connection => "connection",
            Self::Unclassified => "unclassified",
        }
    }

    /// How the boundary treats this kind of failure.
    pub fn policy(self) -> Policy {
        match self {
            Self::ResourceAccess => Policy::Escalate,
            Self::BadResponse | Self::Transport => Policy::Log(Severity::Error),
            Self::RenewalProtocol
            | Self::MissingRequirement
            | Self::Validation
            | Self::Parsing => Policy::Log(Severity::Critical),
            Self::Timeout | Self::TooManyRedirects | Self::BadStatus | Self::Connection => {
                Policy::Log(Severity::Warning)
            }
            Self::Unclassified => Policy::Forensic,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log severity used by the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Warning,
    Error,
    Critical,
}

/// What the boundary does with a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Reschedule with escalating backoff, keyed on the failure signature.
    Escalate,
    /// Log and drop; the task waits for an external re-trigger.
    Log(Severity),
    /// Dump a stack trace, log critical and drop the context.
    Forensic,
}

/// Where a panic happened, recorded by the panic hook before unwinding.
#[derive(Debug)]
pub struct PanicSite {
    /// `file:line:column` of the `panic!` (or failed index, unwrap, ...).
    pub location: Option<String>,
    pub backtrace: Backtrace,
}

/// A failure nobody anticipated.
///
/// The backtrace is captured when the value is created, which for errors
/// converted with `?` is right at the failure site. Panics carry the
/// backtrace taken by the panic hook instead.
pub struct UnclassifiedFailure {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
    location: Option<String>,
    backtrace: Backtrace,
}

impl UnclassifiedFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            location: None,
            backtrace: Backtrace::force_capture(),
        }
    }

    pub fn from_error(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        let err = err.into();
        Self {
            message: err.to_string(),
            source: Some(err),
            location: None,
            backtrace: Backtrace::force_capture(),
        }
    }

    /// Wrap a panic payload caught at the boundary. `site` is what the panic
    /// hook recorded for this panic; without it the backtrace is taken here,
    /// after unwinding.
    pub fn from_panic(payload: Box<dyn Any + Send>, site: Option<PanicSite>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        let message = format!("panic: {detail}");
        match site {
            Some(site) => Self {
                message,
                source: None,
                location: site.location,
                backtrace: site.backtrace,
            },
            None => Self::new(message),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source location of the panic, when the failure came from one.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Debug for UnclassifiedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnclassifiedFailure")
            .field("message", &self.message)
            .field("source", &self.source)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for UnclassifiedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for UnclassifiedFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FailureKind::ResourceAccess, Policy::Escalate)]
    #[case(FailureKind::BadResponse, Policy::Log(Severity::Error))]
    #[case(FailureKind::RenewalProtocol, Policy::Log(Severity::Critical))]
    #[case(FailureKind::MissingRequirement, Policy::Log(Severity::Critical))]
    #[case(FailureKind::Validation, Policy::Log(Severity::Critical))]
    #[case(FailureKind::Parsing, Policy::Log(Severity::Critical))]
    #[case(FailureKind::Transport, Policy::Log(Severity::Error))]
    #[case(FailureKind::Timeout, Policy::Log(Severity::Warning))]
    #[case(FailureKind::TooManyRedirects, Policy::Log(Severity::Warning))]
    #[case(FailureKind::BadStatus, Policy::Log(Severity::Warning))]
    #[case(FailureKind::Connection, Policy::Log(Severity::Warning))]
    #[case(FailureKind::Unclassified, Policy::Forensic)]
    fn every_kind_maps_to_one_policy(#[case] kind: FailureKind, #[case] expected: Policy) {
        assert_eq!(kind.policy(), expected);
    }

    #[test]
    fn resource_access_signature_includes_path_and_reason() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let failure = TaskFailure::resource_access("/certs/a.pem", &io);
        assert_eq!(failure.kind(), FailureKind::ResourceAccess);
        assert_eq!(failure.signature(), "can't access /certs/a.pem: denied");
    }

    #[test]
    fn boxed_errors_become_unclassified() {
        fn fails() -> Result<(), TaskFailure> {
            let parsed: Result<u8, Box<dyn std::error::Error + Send + Sync>> =
                "x".parse::<u8>().map_err(Into::into);
            parsed?;
            Ok(())
        }

        let failure = fails().unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Unclassified);
        assert!(std::error::Error::source(&failure).is_some());
    }

    #[test]
    fn panic_payload_message_is_kept() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        let failure = UnclassifiedFailure::from_panic(payload, None);
        assert_eq!(failure.message(), "panic: boom");
        assert_eq!(failure.location(), None);

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        let failure = UnclassifiedFailure::from_panic(payload, None);
        assert_eq!(failure.to_string(), "panic: owned boom");
    }

    #[test]
    fn panic_site_replaces_boundary_backtrace() {
        let site = PanicSite {
            location: Some("src/cert.rs:10:5".to_string()),
            backtrace: Backtrace::disabled(),
        };
        let payload: Box<dyn Any + Send> = Box::new("boom");
        let failure = UnclassifiedFailure::from_panic(payload, Some(site));
        assert_eq!(failure.location(), Some("src/cert.rs:10:5"));
        assert_eq!(
            failure.backtrace().status(),
            std::backtrace::BacktraceStatus::Disabled
        );
    }
}

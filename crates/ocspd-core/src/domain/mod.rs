//! Domain model (ids, subjects, failure taxonomy, dispositions).

pub mod disposition;
pub mod errors;
pub mod ids;
pub mod subject;
pub mod task_name;

pub use disposition::Disposition;
pub use errors::{FailureKind, PanicSite, Policy, Severity, TaskFailure, UnclassifiedFailure};
pub use ids::TaskId;
pub use subject::{CertSubject, Subject};
pub use task_name::TaskName;

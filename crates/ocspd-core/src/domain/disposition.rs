//! Disposition: what the boundary did with one action run.

use std::path::PathBuf;
use std::time::Duration;

use super::errors::{FailureKind, Severity};

/// Result of running one action inside the supervision boundary.
///
/// The boundary never propagates a failure; this value is the only thing it
/// hands back, and callers are free to ignore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The action succeeded.
    Completed,

    /// Resource-access failure, task re-armed after `delay`.
    Rescheduled { count: u32, delay: Duration },

    /// Resource-access failure repeated too often; the task stays dormant
    /// until an external event creates a new one.
    GaveUp { count: u32 },

    /// Classified failure that is logged and dropped.
    Dropped { kind: FailureKind, severity: Severity },

    /// Unclassified failure. `Ok` holds the trace file, `Err` the reason the
    /// trace could not be written.
    Dumped { trace: Result<PathBuf, String> },
}

impl Disposition {
    /// Did this run hand the task back to the scheduler?
    pub fn is_rescheduled(&self) -> bool {
        matches!(self, Self::Rescheduled { .. })
    }
}

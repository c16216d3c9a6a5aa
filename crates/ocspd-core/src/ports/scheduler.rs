//! Scheduler port - 外部スケジューラへの再登録
//!
//! The scheduler owns the work queues and the threading model. The boundary
//! only needs its re-arm primitive.

use chrono::{DateTime, Utc};

use crate::domain::{TaskId, TaskName};

/// Re-arm primitive of the external scheduler.
///
/// Implementations must not block: the call is a hand-off, the scheduler picks
/// the task up again once `at` has passed.
pub trait Scheduler: Send + Sync {
    /// Schedule `task` (queued under `name`) to run at `at`.
    ///
    /// Calling this again before the task runs replaces the pending time.
    fn rearm(&self, task: TaskId, name: &TaskName, at: DateTime<Utc>);
}

//! Task context: a scheduled task plus repeated-failure tracking.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::scheduled::{ScheduledTask, When};
use crate::domain::{Subject, TaskId, TaskName};
use crate::ports::{Clock, Scheduler};

/// Per-task state handed to the supervision boundary.
///
/// Besides the scheduling data it remembers the signature of the last failure
/// and how many times in a row that same signature was reported. The
/// boundary uses the count to escalate retry delays.
///
/// Invariant: `failure_count >= 1` whenever `last_failure` is set.
#[derive(Debug)]
pub struct TaskContext {
    task: ScheduledTask,
    last_failure: Option<String>,
    failure_count: u32,
    started_at: Option<DateTime<Utc>>,
}

impl TaskContext {
    pub fn new(
        name: impl Into<TaskName>,
        subject: Arc<dyn Subject>,
        when: When,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            task: ScheduledTask::new(name.into(), subject, when, scheduler, clock),
            last_failure: None,
            failure_count: 0,
            started_at: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    pub fn name(&self) -> &TaskName {
        self.task.name()
    }

    pub fn subject(&self) -> &Arc<dyn Subject> {
        self.task.subject()
    }

    pub fn scheduled_time(&self) -> DateTime<Utc> {
        self.task.scheduled_time()
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// When the current attempt entered the boundary.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub(crate) fn mark_started(&mut self) -> DateTime<Utc> {
        let now = self.task.clock().now();
        self.started_at = Some(now);
        now
    }

    pub fn reschedule(&mut self, when: When) -> DateTime<Utc> {
        self.task.reschedule(when)
    }

    /// Record the failure that just happened and return how many times in a
    /// row the same signature has now been seen.
    ///
    /// Signatures are compared by value. A different signature replaces the
    /// previous one and restarts the count at 1.
    pub fn set_last_failure(&mut self, signature: impl Into<String>) -> u32 {
        let signature = signature.into();
        match &self.last_failure {
            Some(last) if *last == signature => {
                self.failure_count = self.failure_count.saturating_add(1);
            }
            _ => {
                self.last_failure = Some(signature);
                self.failure_count = 1;
            }
        }
        self.failure_count
    }

    /// Forget the failure streak (called after a successful run).
    pub fn clear_failures(&mut self) {
        self.last_failure = None;
        self.failure_count = 0;
    }
}

impl fmt::Display for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} for {}", self.name(), self.id(), self.subject())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CertSubject;
    use crate::impls::InMemoryScheduler;
    use crate::ports::SystemClock;

    fn ctx() -> TaskContext {
        TaskContext::new(
            "parse",
            Arc::new(CertSubject::new("/certs/a.pem")),
            When::Now,
            Arc::new(InMemoryScheduler::new()),
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn identical_signatures_accumulate() {
        let mut ctx = ctx();
        assert_eq!(ctx.set_last_failure("disk on fire"), 1);
        assert_eq!(ctx.set_last_failure("disk on fire"), 2);
        assert_eq!(ctx.set_last_failure(String::from("disk on fire")), 3);
        assert_eq!(ctx.last_failure(), Some("disk on fire"));
    }

    #[test]
    fn different_signature_resets_count() {
        let mut ctx = ctx();
        assert_eq!(ctx.set_last_failure("first"), 1);
        assert_eq!(ctx.set_last_failure("second"), 1);
        assert_eq!(ctx.last_failure(), Some("second"));
        assert_eq!(ctx.set_last_failure("second"), 2);
        assert_eq!(ctx.set_last_failure("first"), 1);
    }

    #[test]
    fn clear_failures_restarts_streak() {
        let mut ctx = ctx();
        ctx.set_last_failure("x");
        ctx.set_last_failure("x");
        ctx.clear_failures();
        assert_eq!(ctx.failure_count(), 0);
        assert_eq!(ctx.last_failure(), None);
        assert_eq!(ctx.set_last_failure("x"), 1);
    }

    #[test]
    fn display_names_task_and_subject() {
        let ctx = ctx();
        let shown = ctx.to_string();
        assert!(shown.starts_with("parse task-"));
        assert!(shown.ends_with("for /certs/a.pem"));
    }

    #[test]
    fn dropping_context_leaves_subject_alive() {
        let subject: Arc<dyn Subject> = Arc::new(CertSubject::new("/certs/b.pem"));
        let ctx = TaskContext::new(
            "parse",
            Arc::clone(&subject),
            When::Now,
            Arc::new(InMemoryScheduler::new()),
            Arc::new(SystemClock),
        );
        assert_eq!(Arc::strong_count(&subject), 2);
        drop(ctx);
        assert_eq!(Arc::strong_count(&subject), 1);
        assert_eq!(subject.to_string(), "/certs/b.pem");
    }
}

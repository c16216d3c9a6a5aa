//! Scheduled task: the scheduler-owned part of a task context.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{Subject, TaskId, TaskName};
use crate::ports::{Clock, Scheduler};

/// When a task should run next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    /// As soon as the scheduler gets to it.
    Now,
    /// Relative to the current time.
    In(Duration),
    /// Absolute time. Times in the past are treated as `Now`.
    At(DateTime<Utc>),
}

/// The generic schedulable record: name, subject, next run time and a handle
/// on the scheduler that owns it.
///
/// Design:
/// - `scheduled_time` only changes through `reschedule`.
/// - A computed run time is never earlier than the clock's current time.
/// - The subject is shared with the registry that created the task; dropping
///   the record leaves the subject untouched.
pub struct ScheduledTask {
    id: TaskId,
    name: TaskName,
    subject: Arc<dyn Subject>,
    scheduled_time: DateTime<Utc>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
}

impl ScheduledTask {
    /// Create the record and arm it with the scheduler.
    pub fn new(
        name: TaskName,
        subject: Arc<dyn Subject>,
        when: When,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let id = TaskId::generate(clock.as_ref());
        let scheduled_time = resolve(clock.now(), when);
        scheduler.rearm(id, &name, scheduled_time);
        Self {
            id,
            name,
            subject,
            scheduled_time,
            scheduler,
            clock,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &TaskName {
        &self.name
    }

    pub fn subject(&self) -> &Arc<dyn Subject> {
        &self.subject
    }

    pub fn scheduled_time(&self) -> DateTime<Utc> {
        self.scheduled_time
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Re-arm the task with the scheduler and return the new run time.
    ///
    /// Calling this several times before the task runs just replaces the
    /// pending time.
    pub fn reschedule(&mut self, when: When) -> DateTime<Utc> {
        self.scheduled_time = resolve(self.clock.now(), when);
        self.scheduler.rearm(self.id, &self.name, self.scheduled_time);
        self.scheduled_time
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("subject", &self.subject)
            .field("scheduled_time", &self.scheduled_time)
            .finish_non_exhaustive()
    }
}

fn resolve(now: DateTime<Utc>, when: When) -> DateTime<Utc> {
    match when {
        When::Now => now,
        When::In(delay) => match chrono::Duration::from_std(delay) {
            Ok(delay) => now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC),
            Err(_) => DateTime::<Utc>::MAX_UTC,
        },
        When::At(at) => at.max(now),
    }
}

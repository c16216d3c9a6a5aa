//! Supervision boundary.
//!
//! Runs a task action and absorbs whatever it fails with. Classified failures
//! are logged and, for resource-access failures, retried with escalating
//! backoff. Anything else (including a panic) gets its stack trace dumped to a
//! file and the context is dropped. Nothing escapes `supervise`: the daemon
//! has to stay up.
//!
//! A dropped context is not lost for good. Its subject is still registered
//! with the daemon, so the next file-change event for it creates a fresh
//! context that goes through the boundary again.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;
use tracing::{debug, error, warn};

use super::escalation::{Escalation, EscalationPolicy};
use super::forensic::TraceWriter;
use super::panic_site;
use crate::config::SupervisorConfig;
use crate::context::{TaskContext, When};
use crate::domain::{
    Disposition, FailureKind, Policy, Severity, TaskFailure, UnclassifiedFailure,
};

/// The fault-isolation boundary every task invocation passes through.
///
/// Holds no per-task state, so one instance can be shared by all workers.
#[derive(Debug, Clone)]
pub struct Supervisor {
    escalation: EscalationPolicy,
    traces: TraceWriter,
}

impl Supervisor {
    pub fn new(config: &SupervisorConfig) -> Self {
        panic_site::install();
        Self {
            escalation: config.escalation.clone(),
            traces: TraceWriter::new(config.trace_dir.clone(), config.trace_prefix.clone()),
        }
    }

    /// Run `action` for `ctx`. Panics are caught and treated as unclassified
    /// failures.
    pub fn supervise<F>(&self, ctx: &mut TaskContext, action: F) -> Disposition
    where
        F: FnOnce() -> Result<(), TaskFailure>,
    {
        ctx.mark_started();
        let _ = panic_site::take();
        let result = match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(result) => result,
            Err(payload) => Err(UnclassifiedFailure::from_panic(payload, panic_site::take()).into()),
        };
        self.settle(ctx, result)
    }

    /// Async variant of [`Supervisor::supervise`]. The future runs on its own
    /// tokio task so a panic inside it can't take the caller down. The unwind
    /// is caught inside that task, on the thread that panicked, so the panic
    /// site recorded by the hook is still there.
    pub async fn supervise_async<F>(&self, ctx: &mut TaskContext, action: F) -> Disposition
    where
        F: Future<Output = Result<(), TaskFailure>> + Send + 'static,
    {
        ctx.mark_started();
        let guarded = async move {
            let _ = panic_site::take();
            match AssertUnwindSafe(action).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    Err(UnclassifiedFailure::from_panic(payload, panic_site::take()).into())
                }
            }
        };
        let result = match tokio::spawn(guarded).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                Err(UnclassifiedFailure::from_panic(e.into_panic(), None).into())
            }
            Err(e) => Err(UnclassifiedFailure::new(format!("action did not complete: {e}")).into()),
        };
        self.settle(ctx, result)
    }

    fn settle(&self, ctx: &mut TaskContext, result: Result<(), TaskFailure>) -> Disposition {
        match result {
            Ok(()) => {
                ctx.clear_failures();
                Disposition::Completed
            }
            Err(failure) => self.handle(ctx, failure),
        }
    }

    /// Apply the policy for `failure` to `ctx`.
    ///
    /// Exposed for callers that run the action themselves and only need the
    /// failure handling.
    pub fn handle(&self, ctx: &mut TaskContext, failure: TaskFailure) -> Disposition {
        let kind = failure.kind();
        match kind.policy() {
            Policy::Escalate => self.escalate(ctx, &failure),
            Policy::Log(severity) => {
                emit(severity, ctx, kind, &describe(ctx, &failure));
                Disposition::Dropped { kind, severity }
            }
            Policy::Forensic => self.dump(ctx, &failure),
        }
    }

    fn escalate(&self, ctx: &mut TaskContext, failure: &TaskFailure) -> Disposition {
        let count = ctx.set_last_failure(failure.signature());
        match self.escalation.next(count) {
            Escalation::Retry { delay, log } => {
                if log {
                    emit(Severity::Error, ctx, failure.kind(), &failure.to_string());
                }
                let at = ctx.reschedule(When::In(delay));
                debug!(
                    task = %ctx,
                    count,
                    delay_secs = delay.as_secs(),
                    at = %at,
                    "rescheduled after resource-access failure"
                );
                Disposition::Rescheduled { count, delay }
            }
            Escalation::GiveUp => {
                emit(
                    Severity::Critical,
                    ctx,
                    failure.kind(),
                    &format!("{failure}, giving up.."),
                );
                Disposition::GaveUp { count }
            }
        }
    }

    fn dump(&self, ctx: &TaskContext, failure: &TaskFailure) -> Disposition {
        let context = ctx.to_string();
        let kind = FailureKind::Unclassified;
        let started_at = ctx.started_at().unwrap_or_else(chrono::Utc::now);
        let trace = match self.traces.write(&context, failure, started_at) {
            Ok(path) => {
                error!(
                    severity = "critical",
                    task = %context,
                    kind = %kind,
                    trace = %path.display(),
                    "prevented worker from being killed by unclassified failure: {failure}; \
                     context {context} will be dropped; stack trace saved in {}; \
                     please report this so the failure can be handled explicitly",
                    path.display()
                );
                Ok(path)
            }
            Err(e) => {
                error!(
                    severity = "critical",
                    task = %context,
                    kind = %kind,
                    "prevented worker from being killed by unclassified failure: {failure}; \
                     context {context} will be dropped; couldn't dump stack trace: {e}; \
                     please report this so the failure can be handled explicitly"
                );
                Err(e.to_string())
            }
        };
        Disposition::Dumped { trace }
    }
}

/// Log line for a classified, non-retried failure.
fn describe(ctx: &TaskContext, failure: &TaskFailure) -> String {
    let subject = ctx.subject();
    match failure.kind() {
        FailureKind::Transport => format!("Connection problem: {failure}"),
        FailureKind::Timeout => format!("Timeout error for {subject}: {failure}"),
        FailureKind::TooManyRedirects => format!("Too many redirects for {subject}: {failure}"),
        FailureKind::BadStatus => format!("{failure} for {subject}"),
        FailureKind::Connection => format!("Connection error for {subject}: {failure}"),
        _ => failure.to_string(),
    }
}

fn emit(severity: Severity, ctx: &TaskContext, kind: FailureKind, message: &str) {
    match severity {
        Severity::Debug => debug!(task = %ctx, kind = %kind, "{message}"),
        Severity::Warning => warn!(task = %ctx, kind = %kind, "{message}"),
        Severity::Error => error!(task = %ctx, kind = %kind, "{message}"),
        Severity::Critical => {
            error!(severity = "critical", task = %ctx, kind = %kind, "{message}")
        }
    }
}

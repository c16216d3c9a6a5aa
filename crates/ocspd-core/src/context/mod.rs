//! Task state: schedulable record plus failure-streak tracking.

mod scheduled;
mod task_context;

pub use scheduled::{ScheduledTask, When};
pub use task_context::TaskContext;

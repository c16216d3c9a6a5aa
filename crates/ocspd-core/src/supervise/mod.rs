//! Supervision boundary: failure classification, escalating backoff,
//! forensic dumps and staple cleanup.

mod boundary;
mod escalation;
mod forensic;
mod panic_site;
mod staple;

pub use boundary::Supervisor;
pub use escalation::{Escalation, EscalationPolicy};
pub use forensic::{TraceDumpError, TraceWriter};
pub use staple::delete_staple;

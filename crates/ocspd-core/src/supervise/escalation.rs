//! Escalation policy: retry delays for repeated resource-access failures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to do after the `count`-th consecutive identical failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Retry after `delay`. `log` is false once the failure has been logged
    /// often enough already.
    Retry { delay: Duration, log: bool },

    /// Stop retrying; wait for an external re-trigger.
    GiveUp,
}

/// Escalating backoff keyed on the consecutive failure count.
///
/// With the defaults:
/// - count 1..=3: 60s * count (logged every time)
/// - count 4..=6: 3600s * count (silent)
/// - count 7+: give up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationPolicy {
    /// Counts below this use the short step.
    pub retry_limit: u32,

    /// Counts at or above this give up.
    pub give_up_at: u32,

    pub short_step_secs: u64,
    pub long_step_secs: u64,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            retry_limit: 4,
            give_up_at: 7,
            short_step_secs: 60,
            long_step_secs: 3600,
        }
    }
}

impl EscalationPolicy {
    pub fn next(&self, count: u32) -> Escalation {
        let count = count.max(1);
        if count >= self.give_up_at {
            Escalation::GiveUp
        } else if count < self.retry_limit {
            Escalation::Retry {
                delay: Duration::from_secs(self.short_step_secs.saturating_mul(count.into())),
                log: true,
            }
        } else {
            Escalation::Retry {
                delay: Duration::from_secs(self.long_step_secs.saturating_mul(count.into())),
                log: false,
            }
        }
    }
}

//! InMemoryScheduler - 開発用・テスト用のスケジューラ
//!
//! The real daemon scheduler owns worker threads and queues; this one only
//! keeps the bookkeeping (task -> next run time) so the CLI and tests can see
//! what the boundary asked for.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::domain::{TaskId, TaskName};
use crate::ports::Scheduler;

#[derive(Debug, Clone)]
struct Pending {
    name: TaskName,
    at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    /// task ごとの次回実行時刻（re-arm で上書き）
    pending: HashMap<TaskId, Pending>,
    /// re-arm の履歴（呼び出し順）
    history: Vec<(TaskId, DateTime<Utc>)>,
}

/// In-memory scheduler bookkeeping.
#[derive(Debug, Default)]
pub struct InMemoryScheduler {
    state: Mutex<State>,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pending run time of `task`, if it is armed.
    pub fn pending_at(&self, task: TaskId) -> Option<DateTime<Utc>> {
        self.lock().pending.get(&task).map(|p| p.at)
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Total number of `rearm` calls seen.
    pub fn rearm_count(&self) -> usize {
        self.lock().history.len()
    }

    /// Every run time requested for `task`, oldest first.
    pub fn history(&self, task: TaskId) -> Vec<DateTime<Utc>> {
        self.lock()
            .history
            .iter()
            .filter(|(id, _)| *id == task)
            .map(|(_, at)| *at)
            .collect()
    }

    /// Snapshot of pending tasks ordered by run time (earliest first).
    pub fn pending(&self) -> Vec<(TaskId, TaskName, DateTime<Utc>)> {
        let mut out: Vec<_> = self
            .lock()
            .pending
            .iter()
            .map(|(id, p)| (*id, p.name.clone(), p.at))
            .collect();
        out.sort_by_key(|(id, _, at)| (*at, *id));
        out
    }

    /// Remove and return the tasks whose run time is at or before `now`,
    /// earliest first.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<(TaskId, TaskName)> {
        let mut state = self.lock();
        let mut due: Vec<_> = state
            .pending
            .iter()
            .filter(|(_, p)| p.at <= now)
            .map(|(id, p)| (*id, p.name.clone(), p.at))
            .collect();
        due.sort_by_key(|(id, _, at)| (*at, *id));
        for (id, _, _) in &due {
            state.pending.remove(id);
        }
        due.into_iter().map(|(id, name, _)| (id, name)).collect()
    }
}

impl Scheduler for InMemoryScheduler {
    fn rearm(&self, task: TaskId, name: &TaskName, at: DateTime<Utc>) {
        let mut state = self.lock();
        state.pending.insert(
            task,
            Pending {
                name: name.clone(),
                at,
            },
        );
        state.history.push((task, at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{Duration, TimeZone};

    #[test]
    fn rearm_replaces_pending_time() {
        let scheduler = InMemoryScheduler::new();
        let id = TaskId::generate(&SystemClock);
        let name = TaskName::new("parse");
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        scheduler.rearm(id, &name, t0);
        scheduler.rearm(id, &name, t0 + Duration::minutes(5));

        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.pending_at(id), Some(t0 + Duration::minutes(5)));
        assert_eq!(scheduler.history(id).len(), 2);
    }

    #[test]
    fn take_due_returns_only_ready_tasks_in_order() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(t0);
        let scheduler = InMemoryScheduler::new();
        let name = TaskName::new("parse");

        let late = TaskId::generate(&clock);
        let early = TaskId::generate(&clock);
        let future = TaskId::generate(&clock);
        scheduler.rearm(late, &name, t0 + Duration::seconds(30));
        scheduler.rearm(early, &name, t0);
        scheduler.rearm(future, &name, t0 + Duration::hours(1));

        let due = scheduler.take_due(t0 + Duration::minutes(1));
        let ids: Vec<_> = due.into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![early, late]);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.pending_at(future), Some(t0 + Duration::hours(1)));
    }
}

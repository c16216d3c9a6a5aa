//! Impls - ports の実装（開発用・テスト用）
//!
//! 本番ではデーモン側のスケジューラが `Scheduler` を実装する。

pub mod inmem_scheduler;

pub use self::inmem_scheduler::InMemoryScheduler;

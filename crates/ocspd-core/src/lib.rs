//! ocspd-core
//!
//! Fault-isolation boundary of the OCSP monitoring daemon.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（TaskId, TaskName, Subject, TaskFailure, Disposition）
//! - **ports**: 外部インターフェース（Clock, Scheduler）
//! - **context**: タスク状態（ScheduledTask, TaskContext）
//! - **supervise**: 監視境界（Supervisor, EscalationPolicy, TraceWriter, delete_staple）
//! - **impls**: ports の実装（InMemoryScheduler）
//! - **config**: 設定（SupervisorConfig）

pub mod config;
pub mod context;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod supervise;

#[cfg(test)]
mod testing;

pub use config::SupervisorConfig;
pub use context::{TaskContext, When};
pub use domain::{Disposition, TaskFailure};
pub use supervise::Supervisor;

//! Ports - 外部コンポーネントへのインターフェース
//!
//! The daemon's scheduler and the system clock are consumed through these
//! traits so the boundary can be driven deterministically in tests.

pub mod clock;
pub mod scheduler;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::scheduler::Scheduler;

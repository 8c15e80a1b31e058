//! App - アプリケーションロジック
//!
//! - **scheduler**: 1 tick ごとに due なリクエストを gateway へ relay する retry loop

pub mod scheduler;

pub use self::scheduler::{RetryScheduler, SchedulerHandle, TickReport};

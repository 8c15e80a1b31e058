//! Ports - 抽象化レイヤー
//!
//! 外部との境界（時刻、gateway）を trait にしておき、
//! テストで差し替えられるようにする。

pub mod clock;
pub mod relay;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::relay::Relay;

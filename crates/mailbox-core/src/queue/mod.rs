//! Queue module: in-memory work queue and max-retry policy.

mod memory;
mod retry;

pub use memory::{DEFAULT_CAPACITY, WorkQueue};
pub use retry::{Disposition, RetryPolicy};

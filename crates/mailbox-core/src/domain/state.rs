//! Request state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle of a deferred request.
///
/// State transitions:
/// - Pending -> Pending (failed attempt, retried on the next deadline)
/// - Pending -> Delivered (gateway answered 200/202)
/// - Pending -> Exhausted (failed attempt with the retry budget spent)
///
/// Terminal states are the "completion flag": the item is never touched again
/// and the next compaction drops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Waiting for its next deadline.
    Pending,

    /// Accepted by the gateway.
    Delivered,

    /// Abandoned after `max_retries` failed attempts.
    Exhausted,
}

impl RequestState {
    /// Is this a terminal state (no further attempts)?
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Delivered | RequestState::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_is_live() {
        assert!(!RequestState::Pending.is_terminal());
        assert!(RequestState::Delivered.is_terminal());
        assert!(RequestState::Exhausted.is_terminal());
    }

    #[test]
    fn serializes_snake_case() {
        let s = serde_json::to_string(&RequestState::Exhausted).unwrap();
        assert_eq!(s, "\"exhausted\"");
    }
}

//! Retry policy: decides what happens to an item after a failed attempt.

/// What to do with a request whose attempt just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Leave it pending; it is retried on or after its next deadline.
    Retry,

    /// Retry budget spent; mark it exhausted so compaction drops it.
    Exhaust,
}

/// Max-retry enforcement.
///
/// Pacing is not decided here: every item keeps its own fixed
/// `restart_delay`. This only answers "is the budget spent?".
///
/// - `max_retries == 0` means no budget: retry until delivered.
/// - otherwise the item is exhausted once `retries >= max_retries`.
///
/// With enforcement off, failed items stay pending forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub enforce_max_retries: bool,
}

impl RetryPolicy {
    pub fn enforcing() -> Self {
        Self {
            enforce_max_retries: true,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            enforce_max_retries: false,
        }
    }

    /// `retries` already counts the attempt that just failed.
    pub fn after_failure(&self, retries: u32, max_retries: u32) -> Disposition {
        if self.enforce_max_retries && max_retries > 0 && retries >= max_retries {
            Disposition::Exhaust
        } else {
            Disposition::Retry
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::enforcing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::first_failure_of_three(1, 3, Disposition::Retry)]
    #[case::budget_reached(3, 3, Disposition::Exhaust)]
    #[case::single_shot(1, 1, Disposition::Exhaust)]
    #[case::seeded_past_budget(5, 3, Disposition::Exhaust)]
    #[case::no_budget(1, 0, Disposition::Retry)]
    #[case::no_budget_many_attempts(1_000, 0, Disposition::Retry)]
    fn enforcing_policy(#[case] retries: u32, #[case] max: u32, #[case] expected: Disposition) {
        assert_eq!(RetryPolicy::enforcing().after_failure(retries, max), expected);
    }

    #[rstest]
    #[case(1, 1)]
    #[case(10, 3)]
    #[case(1, 0)]
    fn unbounded_policy_always_retries(#[case] retries: u32, #[case] max: u32) {
        assert_eq!(
            RetryPolicy::unbounded().after_failure(retries, max),
            Disposition::Retry
        );
    }

    #[test]
    fn default_enforces() {
        assert!(RetryPolicy::default().enforce_max_retries);
    }
}

//! Result of one relay attempt, as recorded on the request.

use crate::error::RelayError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Gateway answered 200 or 202.
    Delivered { status: u16 },

    /// Any other status, or no answer at all.
    Failed { status: u16, reason: String },
}

impl RelayOutcome {
    pub fn status(&self) -> u16 {
        match self {
            RelayOutcome::Delivered { status } | RelayOutcome::Failed { status, .. } => *status,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, RelayOutcome::Delivered { .. })
    }
}

impl From<Result<u16, RelayError>> for RelayOutcome {
    fn from(result: Result<u16, RelayError>) -> Self {
        match result {
            Ok(status) => RelayOutcome::Delivered { status },
            Err(err) => RelayOutcome::Failed {
                status: err.status_code(),
                reason: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GATEWAY_UNREACHABLE;

    #[test]
    fn ok_result_is_delivered() {
        let outcome = RelayOutcome::from(Ok(202));
        assert!(outcome.is_delivered());
        assert_eq!(outcome.status(), 202);
    }

    #[test]
    fn transport_error_uses_sentinel_status() {
        let outcome = RelayOutcome::from(Err(RelayError::Unreachable("refused".into())));
        assert!(!outcome.is_delivered());
        assert_eq!(outcome.status(), GATEWAY_UNREACHABLE);
    }

    #[test]
    fn rejected_keeps_raw_status() {
        let outcome = RelayOutcome::from(Err(RelayError::Rejected(500)));
        assert_eq!(
            outcome,
            RelayOutcome::Failed {
                status: 500,
                reason: "unexpected status from gateway: 500".into(),
            }
        );
    }
}

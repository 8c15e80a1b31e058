use std::time::Duration;

use thiserror::Error;

/// Status reported for an attempt that never got an HTTP response.
pub const GATEWAY_UNREACHABLE: u16 = 502;

#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("function name must not be empty")]
    MissingFunction,

    #[error("invalid function name: {0:?}")]
    InvalidFunction(String),

    #[error("invalid value for header {name}: {value:?}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("queue is full (capacity={capacity})")]
    QueueFull { capacity: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to build relay client: {0}")]
    Client(String),

    #[error("metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Why a relay attempt did not deliver.
///
/// All variants are treated the same by the scheduler ("try again later");
/// the distinction only matters for logs and the reported status code.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    #[error("gateway did not answer within {0:?}")]
    Timeout(Duration),

    #[error("unexpected status from gateway: {0}")]
    Rejected(u16),
}

impl RelayError {
    /// Raw status for a rejected attempt, `GATEWAY_UNREACHABLE` otherwise.
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::Rejected(status) => *status,
            RelayError::Unreachable(_) | RelayError::Timeout(_) => GATEWAY_UNREACHABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_report_sentinel_status() {
        assert_eq!(
            RelayError::Unreachable("refused".into()).status_code(),
            GATEWAY_UNREACHABLE
        );
        assert_eq!(
            RelayError::Timeout(Duration::from_secs(1)).status_code(),
            GATEWAY_UNREACHABLE
        );
        assert_eq!(RelayError::Rejected(500).status_code(), 500);
    }
}

//! Deferred request: immutable call definition + mutable retry state.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};

use super::{RelayOutcome, RequestId, RequestState};
use crate::error::MailboxError;

/// Restart delay used when the caller does not send `X-Delay-Duration`.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(4);

/// What to call, and how often it may be retried.
///
/// Fixed at admission. The scheduler shares it with in-flight relay jobs
/// through an `Arc`, so nothing here is ever mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDefinition {
    function: String,
    query: Option<String>,
    headers: Vec<(String, String)>,
    max_retries: u32,
    restart_delay: Duration,
    body: Bytes,
}

impl CallDefinition {
    pub fn new(function: impl Into<String>, body: impl Into<Bytes>) -> Result<Self, MailboxError> {
        let function = function.into();
        if function.trim().is_empty() {
            return Err(MailboxError::MissingFunction);
        }
        // dot segments would be resolved away on the outbound path
        if function == "." || function == ".." {
            return Err(MailboxError::InvalidFunction(function));
        }
        Ok(Self {
            function,
            query: None,
            headers: Vec::new(),
            max_retries: 0,
            restart_delay: DEFAULT_RESTART_DELAY,
            body: body.into(),
        })
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query.filter(|q| !q.is_empty());
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_restart_delay(mut self, restart_delay: Duration) -> Self {
        self.restart_delay = restart_delay;
        self
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn restart_delay(&self) -> Duration {
        self.restart_delay
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// A queued request.
///
/// This is the single source of truth for retry state. Only the scheduler
/// calls the mutating methods; the queue makes sure it happens under its lock.
#[derive(Debug, Clone)]
pub struct DeferredRequest {
    pub id: RequestId,
    pub definition: Arc<CallDefinition>,
    pub state: RequestState,

    /// Attempts made so far (seeded from `X-Retries` at admission).
    pub retries: u32,

    /// Admission time until the first attempt, then the time of the last attempt.
    pub last_attempt_at: DateTime<Utc>,

    /// Status code of the last attempt, if any was made.
    pub last_status: Option<u16>,
    pub last_error: Option<String>,

    pub admitted_at: DateTime<Utc>,
}

impl DeferredRequest {
    pub fn new(
        id: RequestId,
        definition: CallDefinition,
        retries: u32,
        admitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            definition: Arc::new(definition),
            state: RequestState::Pending,
            retries,
            last_attempt_at: admitted_at,
            last_status: None,
            last_error: None,
            admitted_at,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state.is_terminal()
    }

    /// Earliest time the next attempt may start.
    pub fn deadline(&self) -> DateTime<Utc> {
        let delay = TimeDelta::from_std(self.definition.restart_delay()).unwrap_or(TimeDelta::MAX);
        self.last_attempt_at
            .checked_add_signed(delay)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed() && now >= self.deadline()
    }

    /// Stamp a new attempt and hand out what the relay needs for it.
    ///
    /// `last_attempt_at` never moves backwards, even if the clock does.
    pub fn start_attempt(&mut self, now: DateTime<Utc>) -> RelayJob {
        self.last_attempt_at = self.last_attempt_at.max(now);
        self.retries = self.retries.saturating_add(1);
        RelayJob {
            id: self.id,
            definition: Arc::clone(&self.definition),
            retries: self.retries,
        }
    }

    /// Apply the result of an attempt. Completed items are left untouched.
    pub fn apply(&mut self, outcome: &RelayOutcome) {
        if self.is_completed() {
            return;
        }
        match outcome {
            RelayOutcome::Delivered { status } => {
                self.state = RequestState::Delivered;
                self.last_status = Some(*status);
                self.last_error = None;
            }
            RelayOutcome::Failed { status, reason } => {
                self.last_status = Some(*status);
                self.last_error = Some(reason.clone());
            }
        }
    }

    pub fn mark_exhausted(&mut self) {
        if !self.is_completed() {
            self.state = RequestState::Exhausted;
        }
    }
}

/// One relay attempt, detached from the queue.
///
/// `retries` is the count at the moment the attempt was stamped, which is
/// what goes out in `X-Retries`.
#[derive(Debug, Clone)]
pub struct RelayJob {
    pub id: RequestId,
    pub definition: Arc<CallDefinition>,
    pub retries: u32,
}

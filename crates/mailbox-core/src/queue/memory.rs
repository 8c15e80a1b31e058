//! In-memory work queue.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{Disposition, RetryPolicy};
use crate::domain::{CallDefinition, DeferredRequest, RelayJob, RelayOutcome, RequestId, RequestState};
use crate::error::MailboxError;
use crate::observability::QueueCounts;
use crate::ports::Clock;

/// Default upper bound on queued items.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Queue storage. Everything behind one lock.
struct WorkQueueState {
    /// All requests (single source of truth).
    entries: HashMap<RequestId, DeferredRequest>,

    /// Admission order (RequestIds only).
    order: VecDeque<RequestId>,
}

impl WorkQueueState {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn counts_by_state(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for request in self.entries.values() {
            match request.state {
                RequestState::Pending => counts.pending += 1,
                RequestState::Delivered => counts.delivered += 1,
                RequestState::Exhausted => counts.exhausted += 1,
            }
        }
        counts
    }
}

/// Work queue shared by the admission path and the retry scheduler.
///
/// Design:
/// - Items are keyed by `RequestId`; `order` only remembers admission order.
/// - Admission (`add`) and the scheduler (`claim_due`, `record_outcome`,
///   `compact`) take the same mutex. The scheduler never holds it across a
///   relay call: it claims owned `RelayJob`s, releases the lock, relays, and
///   writes results back by key.
/// - Compaction is the only way an item leaves the queue.
pub struct WorkQueue {
    state: Mutex<WorkQueueState>,
    clock: Arc<dyn Clock>,
    capacity: usize,
}

impl WorkQueue {
    pub fn new(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            state: Mutex::new(WorkQueueState::new()),
            clock,
            capacity,
        }
    }

    /// Admit a request at the tail.
    ///
    /// `retries` seeds the retry counter (callers may forward a count from an
    /// earlier hop). Admission time comes from the queue's clock.
    pub async fn add(&self, definition: CallDefinition, retries: u32) -> Result<RequestId, MailboxError> {
        let mut state = self.state.lock().await;
        if state.entries.len() >= self.capacity {
            return Err(MailboxError::QueueFull {
                capacity: self.capacity,
            });
        }

        let now = self.clock.now();
        let mut id = RequestId::generate(now);
        while state.entries.contains_key(&id) {
            id = RequestId::generate(now);
        }

        state
            .entries
            .insert(id, DeferredRequest::new(id, definition, retries, now));
        state.order.push_back(id);
        Ok(id)
    }

    /// Stamp every due item and return its relay job, in admission order.
    ///
    /// "Due" means pending and `now >= last_attempt_at + restart_delay`.
    /// The stamp (`last_attempt_at = now`, `retries += 1`) is written before
    /// the lock is released, so it is visible to anything that runs after.
    pub async fn claim_due(&self, now: DateTime<Utc>) -> Vec<RelayJob> {
        let mut guard = self.state.lock().await;
        let WorkQueueState { entries, order } = &mut *guard;

        let mut jobs = Vec::new();
        for id in order.iter() {
            if let Some(request) = entries.get_mut(id)
                && request.is_due(now)
            {
                jobs.push(request.start_attempt(now));
            }
        }
        jobs
    }

    /// Write the result of an attempt back into its item.
    ///
    /// Returns the item's state afterwards, or `None` if it is gone.
    /// Completed items are never modified.
    pub async fn record_outcome(
        &self,
        id: RequestId,
        outcome: &RelayOutcome,
        policy: &RetryPolicy,
    ) -> Option<RequestState> {
        let mut state = self.state.lock().await;
        let request = state.entries.get_mut(&id)?;
        if request.is_completed() {
            return Some(request.state);
        }

        request.apply(outcome);
        if !outcome.is_delivered()
            && policy.after_failure(request.retries, request.definition.max_retries())
                == Disposition::Exhaust
        {
            request.mark_exhausted();
        }
        Some(request.state)
    }

    /// Drop every completed item, keeping survivors in admission order.
    ///
    /// Returns how many items were removed.
    pub async fn compact(&self) -> usize {
        let mut guard = self.state.lock().await;
        let WorkQueueState { entries, order } = &mut *guard;

        let before = entries.len();
        entries.retain(|_, request| !request.is_completed());
        order.retain(|id| entries.contains_key(id));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get(&self, id: RequestId) -> Option<DeferredRequest> {
        self.state.lock().await.entries.get(&id).cloned()
    }

    /// Copy of all items in admission order.
    pub async fn snapshot(&self) -> Vec<DeferredRequest> {
        let state = self.state.lock().await;
        state
            .order
            .iter()
            .filter_map(|id| state.entries.get(id).cloned())
            .collect()
    }

    pub async fn counts_by_state(&self) -> QueueCounts {
        self.state.lock().await.counts_by_state()
    }
}

//! RetryScheduler - 定期スキャンと再送
//!
//! # フロー（1 tick）
//! 1. `WorkQueue::claim_due()` で期限の来た item を取得（ここで retries / last_attempt_at を更新）
//! 2. ロックを持たずに `Relay::attempt()` を順番に実行
//! 3. `WorkQueue::record_outcome()` で結果を key で書き戻す
//! 4. `WorkQueue::compact()` で完了済みを削除
//! 5. queue depth を gauge に反映
//!
//! tick は 1 本の task からしか実行されないので、2 つの tick が並行することはない。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::{RelayOutcome, RequestState};
use crate::observability::Metrics;
use crate::ports::{Clock, Relay};
use crate::queue::{RetryPolicy, WorkQueue};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub due: usize,
    pub delivered: usize,
    pub failed: usize,
    pub exhausted: usize,
    pub compacted: usize,
    pub depth: usize,
}

pub struct RetryScheduler {
    queue: Arc<WorkQueue>,
    relay: Arc<dyn Relay>,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
    policy: RetryPolicy,
    interval: Duration,
}

impl RetryScheduler {
    pub fn new(
        queue: Arc<WorkQueue>,
        relay: Arc<dyn Relay>,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
        policy: RetryPolicy,
        interval: Duration,
    ) -> Self {
        Self {
            queue,
            relay,
            clock,
            metrics,
            policy,
            interval,
        }
    }

    /// Run one scan: relay every due item, write results back, compact.
    pub async fn tick(&self) -> TickReport {
        let jobs = self.queue.claim_due(self.clock.now()).await;
        let mut report = TickReport {
            due: jobs.len(),
            ..TickReport::default()
        };

        for job in &jobs {
            let outcome = RelayOutcome::from(self.relay.attempt(job).await);
            self.metrics.record_attempt(outcome.is_delivered());

            match self.queue.record_outcome(job.id, &outcome, &self.policy).await {
                Some(RequestState::Delivered) => report.delivered += 1,
                Some(RequestState::Pending) => {
                    report.failed += 1;
                    debug!(
                        request_id = %job.id,
                        retries = job.retries,
                        status = outcome.status(),
                        "relay failed, will retry"
                    );
                }
                Some(RequestState::Exhausted) => {
                    report.failed += 1;
                    report.exhausted += 1;
                    self.metrics.record_exhausted();
                    warn!(
                        request_id = %job.id,
                        function = job.definition.function(),
                        retries = job.retries,
                        max_retries = job.definition.max_retries(),
                        status = outcome.status(),
                        "retry budget exhausted, dropping request"
                    );
                }
                None => {}
            }
        }

        report.compacted = self.queue.compact().await;
        report.depth = self.queue.len().await;
        self.metrics.set_queue_depth(report.depth);

        if report.due > 0 || report.compacted > 0 {
            info!(
                due = report.due,
                delivered = report.delivered,
                failed = report.failed,
                exhausted = report.exhausted,
                compacted = report.compacted,
                depth = report.depth,
                "tick"
            );
        }
        report
    }

    /// Tick on a fixed period until the handle asks to stop.
    ///
    /// A slow tick delays the next one instead of triggering a burst.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = self.interval.as_millis(), "retry scheduler started");

            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        // handle dropped without asking: stop as well
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        self.tick().await;
                    }
                }
            }

            info!("retry scheduler stopped");
        });

        SchedulerHandle { shutdown_tx, join }
    }
}

/// Handle to the running scheduler task.
/// - `request_shutdown()` で次の tick から止まる（実行中の attempt は中断しない）
/// - `shutdown_and_join()` で終了を待つ
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn request_shutdown(&self) {
        // receiver may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

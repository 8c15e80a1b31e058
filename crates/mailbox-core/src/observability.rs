//! Logging setup, prometheus metrics and queue status views.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::MailboxError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub delivered: usize,
    pub exhausted: usize,
}

/// Initialize tracing/logging for the process.
///
/// Filter comes from `RUST_LOG` (default `info`). Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Process metrics.
///
/// Owns its own registry; built once at startup and shared by the scheduler
/// (writes) and the `/metrics` route (reads).
pub struct Metrics {
    registry: Registry,
    queue_depth: IntGauge,
    relay_attempts: IntCounterVec,
    exhausted: IntCounter,
    admissions: IntCounter,
    admissions_rejected: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, MailboxError> {
        let registry = Registry::new();

        let queue_depth = IntGauge::new("mailbox_queue_depth", "Mailbox Queue Depth")?;
        let relay_attempts = IntCounterVec::new(
            Opts::new(
                "mailbox_relay_attempts_total",
                "Relay attempts made against the gateway",
            ),
            &["outcome"], // outcome=[delivered|failed]
        )?;
        let exhausted = IntCounter::new(
            "mailbox_requests_exhausted_total",
            "Requests dropped after spending their retry budget",
        )?;
        let admissions = IntCounter::new("mailbox_admissions_total", "Requests admitted")?;
        let admissions_rejected = IntCounter::new(
            "mailbox_admissions_rejected_total",
            "Requests rejected because the queue was full",
        )?;

        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(relay_attempts.clone()))?;
        registry.register(Box::new(exhausted.clone()))?;
        registry.register(Box::new(admissions.clone()))?;
        registry.register(Box::new(admissions_rejected.clone()))?;

        Ok(Self {
            registry,
            queue_depth,
            relay_attempts,
            exhausted,
            admissions,
            admissions_rejected,
        })
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.set(i64::try_from(depth).unwrap_or(i64::MAX));
    }

    pub fn queue_depth(&self) -> i64 {
        self.queue_depth.get()
    }

    pub fn record_attempt(&self, delivered: bool) {
        let outcome = if delivered { "delivered" } else { "failed" };
        self.relay_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn record_exhausted(&self) {
        self.exhausted.inc();
    }

    pub fn record_admission(&self) {
        self.admissions.inc();
    }

    pub fn record_rejection(&self) {
        self.admissions_rejected.inc();
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String, MailboxError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()).into())
    }
}

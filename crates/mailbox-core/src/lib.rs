//! mailbox-core
//!
//! Dead-letter relay: deferred function calls are admitted over HTTP, held in
//! an in-memory work queue and re-sent to the gateway on a fixed tick until
//! they are delivered or run out of retries.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, request, outcome, state）
//! - **ports**: 抽象化レイヤー（Clock, Relay）
//! - **queue**: WorkQueue と RetryPolicy
//! - **app**: RetryScheduler（tick loop と shutdown）
//! - **impls**: 実装（GatewayRelay）
//! - **http**: axum router（admission / metrics / healthz）
//! - **config / observability / error**: 設定、tracing と Prometheus、エラー型

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;

pub use app::{RetryScheduler, SchedulerHandle};
pub use config::Config;
pub use error::{MailboxError, RelayError};
pub use http::{AppState, router};
pub use impls::GatewayRelay;
pub use observability::{Metrics, init_tracing};
pub use queue::{RetryPolicy, WorkQueue};

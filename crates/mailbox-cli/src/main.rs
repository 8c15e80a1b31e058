use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};

use mailbox_core::ports::SystemClock;
use mailbox_core::{
    AppState, Config, GatewayRelay, Metrics, RetryScheduler, WorkQueue, init_tracing, router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // (A) 設定とログ
    let config = Config::load().context("failed to load configuration")?;
    init_tracing(config.log_json);
    info!(
        gateway_url = %config.gateway_url,
        tick_interval_ms = config.tick_interval_ms,
        queue_capacity = config.queue_capacity,
        enforce_max_retries = config.enforce_max_retries,
        "starting mailbox"
    );

    // (B) queue / relay / metrics を組み立てる
    let clock = Arc::new(SystemClock);
    let queue = Arc::new(WorkQueue::new(clock.clone(), config.queue_capacity));
    let metrics = Arc::new(Metrics::new().context("failed to register metrics")?);
    let relay = Arc::new(
        GatewayRelay::new(&config.gateway_url, config.relay_timeout())
            .context("failed to build gateway client")?,
    );

    // (C) retry scheduler を起動
    let scheduler = RetryScheduler::new(
        queue.clone(),
        relay,
        clock,
        metrics.clone(),
        config.retry_policy(),
        config.tick_interval(),
    )
    .spawn();

    // (D) admission listener（SIGINT / SIGTERM で graceful shutdown）
    let app = router(AppState { queue, metrics });
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // (E) listener が止まったら scheduler も止める。queue の中身は捨てる
    scheduler.shutdown_and_join().await;
    served.context("http server failed")?;
    info!("mailbox stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}

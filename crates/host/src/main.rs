//! Settlement host entry point.

use event_store::InMemoryEventStore;
use host::Runtime;
use host::config::Config;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Configuration and tracing
    let config = Config::from_env();
    host::init_tracing(&config);

    // 2. Install Prometheus exporter
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(config.metrics_addr())
        .install()
        .expect("failed to install Prometheus exporter");

    // 3. Start projection workers and the settlement scheduler
    let store = InMemoryEventStore::new();
    let runtime = Runtime::start(&config, store, CancellationToken::new());
    tracing::info!(
        metrics_addr = %config.metrics_addr(),
        poll_interval_ms = config.projection_poll_interval.as_millis() as u64,
        batch_size = config.projection_batch_size,
        settlement_interval_secs = config.settlement_interval.as_secs(),
        "settlement host running"
    );

    // 4. Stop on signal
    shutdown_signal().await;
    runtime.shutdown().await;

    tracing::info!("host shut down gracefully");
}

//! brew-scheduler
//!
//! Serves the order API and drives the reconciliation loop.

use std::sync::Arc;

use anyhow::Result;
use brew_scheduler::{
    api, config, scheduler::SchedulerWorker, service::ShopService, state::AppState, store::Store,
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to BREW_LOG_LEVEL.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting brew scheduler");
    info!(
        listen_addr = %config.listen_addr,
        capacity = config.capacity,
        tick_interval_secs = config.tick_interval.as_secs(),
        "Configuration loaded"
    );

    let service = Arc::new(ShopService::new(Store::in_memory(), config.shop()));
    if config.seed_defaults {
        service.seed_defaults().await?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_worker = SchedulerWorker::new(service.clone(), config.tick_interval);
    let scheduler_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            scheduler_worker.run(shutdown_rx).await;
        }
    });

    let app = api::create_router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    let _ = shutdown_tx.send(true);

    info!("Waiting for scheduler worker to shut down...");
    let shutdown_timeout = std::time::Duration::from_secs(10);
    if let Err(e) = tokio::time::timeout(shutdown_timeout, scheduler_handle).await {
        warn!(error = %e, "Scheduler worker did not shut down in time");
    }

    info!("Brew scheduler shutdown complete");
    Ok(())
}

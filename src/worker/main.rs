use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::sync::watch;

use spell_binder::config::Config;
use spell_binder::services::{JobProcessor, SyncJobExecutor};
use spell_binder::state::AppState;
use spell_binder::telemetry;

const DEQUEUE_TIMEOUT_SECONDS: u64 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("spell_binder=info,worker=info");

    tracing::info!("Starting Spell Binder worker...");

    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::info!("Connecting to databases...");
    let state = AppState::new(config)
        .await
        .context("Failed to initialize application state")?;
    let state = Arc::new(state);
    tracing::info!("Database connections established");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, stopping worker...");
        let _ = shutdown_tx.send(true);
    });

    let executor = SyncJobExecutor::from_state(&state).context("Failed to build job executor")?;
    let processor = JobProcessor::new(
        state.db.clone(),
        state.job_queue.clone(),
        Arc::new(executor),
    );

    tracing::info!("Worker started, waiting for jobs...");
    loop {
        if *shutdown_rx.borrow() {
            tracing::info!("Shutdown requested, exiting worker loop");
            break;
        }

        match state.job_queue.dequeue(DEQUEUE_TIMEOUT_SECONDS).await {
            Ok(Some(job)) => {
                processor.process(job).await;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "Error dequeuing job");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }

    tracing::info!("Worker shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

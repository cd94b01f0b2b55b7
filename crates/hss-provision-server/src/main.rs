#![doc = include_str!("../README.md")]

mod server;

use anyhow::Context;
use clap::Parser;
use core::pin::pin;
use hss_provision::SubscriberStore;
use server::build_app;
use server::config::{CliArgs, ServerConfig};
use server::state::{AppState, open_store};
use server::telemetry::init_telemetry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Notify;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry(config.log_json)?;
    log_startup_info(&config);

    let store = open_store(&config);
    store
        .connect()
        .await
        .with_context(|| format!("failed to connect {} store", store.backend()))?;

    let app = build_app(AppState::from_config(Arc::clone(&store), &config), config.cors);
    let listener = TcpListener::bind(config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;

    let drain = Arc::new(Notify::new());
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let drain = Arc::clone(&drain);
        async move { drain.notified().await }
    });
    let mut server = pin!(server.into_future());

    let served = tokio::select! {
        res = &mut server => res,
        () = shutdown_signal() => {
            drain.notify_one();
            match tokio::time::timeout(config.shutdown_timeout, &mut server).await {
                Ok(res) => res,
                Err(_) => {
                    tracing::warn!(
                        timeout = ?config.shutdown_timeout,
                        "in-flight requests did not drain in time"
                    );
                    Ok(())
                }
            }
        }
    };

    if let Err(err) = store.close().await {
        tracing::error!(error = %err, "failed to close subscriber store");
    }
    providers.shutdown();

    served?;
    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting provisioning service on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting provisioning service on {} with {:?} store",
            config.server_addr,
            config.store
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, draining requests...");
}

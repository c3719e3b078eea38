use std::sync::Arc;

use clap::Parser;
use tokio::{net::TcpListener, signal, sync::broadcast};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use memory::InMemoryStore;
use sweeper::Sweeper;

mod api;
mod config;
mod entry;
mod memory;
mod otel;
mod request;
mod response;
mod store;
mod sweeper;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let (otel_layer, otel_error) = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => match otel::init_layer(endpoint) {
            Ok(layer) => (Some(layer), None),
            Err(e) => (None, Some(e)),
        },
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .init();
    if let Some(e) = otel_error {
        tracing::warn!(error = %e, "span export disabled");
    }

    info!(?config, "Loaded configuration");

    let store =
        Arc::new(InMemoryStore::new(config.ttl_seconds).with_max_entries(config.max_entries));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let sweeper = Sweeper::spawn(store.clone(), config.sweep_interval(), shutdown_rx);

    let listener = TcpListener::bind(config.listen_addr()).await?;
    info!("server started on address {}", listener.local_addr()?);
    axum::serve(listener, api::router(store))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Receiver may already be gone if the sweeper exited on its own
    let _ = shutdown_tx.send(());
    sweeper.await?;
    otel::shutdown();
    info!("server stopped");
    Ok(())
}

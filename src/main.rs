//! Publish scheduler
//!
//! Main entry point that wires the pipeline crates together and runs the
//! loops until shutdown or the first fatal error.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, fmt};

use publish_core::config::AppConfig;
use publish_core::error::AppError;
use publish_core::traits::MessageConsumer;
use publish_worker::bus::{MemoryBus, MemoryConsumer};
use publish_worker::{Liveness, PipelineBus, PipelineRunner};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "publish-scheduler", version, about = "Scheduled collection publishing pipeline")]
struct Cli {
    /// Configuration overlay loaded after `config/default.toml`.
    #[arg(long, default_value = "development")]
    env: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Pipeline stopped on fatal error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.is_json() {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .pretty()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting publish scheduler v{}", env!("CARGO_PKG_VERSION"));

    let store = publish_database::connect_store(&config.database).await?;
    let secrets = publish_secrets::build_resolver(&config.secrets)?;

    let bus = MemoryBus::new(&config.bus);
    let topics = config.bus.topics.clone();
    let pipeline = PipelineBus::from_memory(&bus, &topics)?;
    let liveness = Liveness::new();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Outbound topics have no consumer in a single-process deployment.
    let mut sinks = Vec::new();
    for topic in [
        &topics.publish_file,
        &topics.publish_delete,
        &topics.collection_complete,
    ] {
        let consumer = bus.take_consumer(topic)?;
        sinks.push(tokio::spawn(log_sink(consumer, shutdown_rx.clone())));
    }

    let server_handle: Option<JoinHandle<Result<(), AppError>>> = if config.server.enabled {
        let state = publish_api::ApiState {
            store: Arc::clone(&store),
            liveness: liveness.clone(),
            liveness_grace: config.server.liveness_grace(),
            schedule: Arc::new(bus.producer(&topics.schedule)?),
        };
        let router = publish_api::build_router(state);
        let server_config = config.server.clone();
        let rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            publish_api::serve(&server_config, router, rx).await
        }))
    } else {
        tracing::info!("HTTP server disabled");
        None
    };

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = signal_tx.send(true);
    });

    let runner = PipelineRunner::new(config, Arc::clone(&store), secrets, pipeline, liveness);
    let result = runner.run(shutdown_rx).await;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = server_handle {
        match handle.await {
            Ok(Err(e)) => tracing::warn!(error = %e, "HTTP server stopped with error"),
            Err(e) => tracing::warn!(error = %e, "HTTP server task panicked"),
            Ok(Ok(())) => {}
        }
    }
    for sink in sinks {
        let _ = sink.await;
    }
    store.close().await;

    if result.is_ok() {
        tracing::info!("Publish scheduler shut down gracefully");
    }
    result
}

/// Log and commit every message on an outbound topic.
async fn log_sink(mut consumer: MemoryConsumer, mut shutdown: watch::Receiver<bool>) {
    let topic = consumer.topic().to_string();
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            next = consumer.next() => {
                let message = match next {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        tracing::warn!(topic = %topic, error = %e, "Sink consumer failed");
                        break;
                    }
                    None => break,
                };
                tracing::debug!(
                    topic = %topic,
                    offset = message.offset(),
                    payload = %String::from_utf8_lossy(message.data()),
                    "Outbound message"
                );
                if let Err(e) = message.commit().await {
                    tracing::warn!(error = %e, "Sink commit failed");
                }
            }
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
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

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use metrical::{
    http,
    storage::{Config, DiskConfig, Storage},
    EncodeStrategy,
};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Simple metrics database", long_about = None)]
struct Args {
    /// Address the HTTP API listens on.
    #[arg(long, env = "METRICAL_LISTEN", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Directory for persisted segments. Data is kept in memory only when unset.
    #[arg(long, env = "METRICAL_DATA_PATH")]
    data_path: Option<PathBuf>,

    /// Encoding of flushed data points (csv or gorilla).
    #[arg(long, env = "METRICAL_ENCODE_STRATEGY", default_value = "csv")]
    encode_strategy: EncodeStrategy,

    /// Seconds between flushes to disk.
    #[arg(long, env = "METRICAL_FLUSH_INTERVAL", default_value = "10")]
    flush_interval: u64,
}

impl Args {
    fn storage_config(&self) -> Config {
        match &self.data_path {
            Some(data_path) => Config {
                disk: Some(DiskConfig {
                    data_path: data_path.clone(),
                    encode_strategy: self.encode_strategy,
                }),
                flush_interval: Some(self.flush_interval),
            },
            None => Config::default(),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,metrical=debug")),
        )
        .init();

    let args = Args::parse();

    match &args.data_path {
        Some(path) => info!(path = ?path, strategy = %args.encode_strategy, "opening database"),
        None => info!("no data path given, keeping metrics in memory only"),
    }
    let storage = Arc::new(
        Storage::new(args.storage_config()).context("failed to open the metrics database")?,
    );
    info!(series = storage.series_count(), "database ready");

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind to {}", args.listen))?;
    http::serve(listener, storage.clone(), shutdown_signal()).await?;

    storage
        .close()
        .context("failed to flush metrics on shutdown")?;
    info!("metrical stopped");
    Ok(())
}

//! `mailbridge` - JSON-lines server for MIME transfer encoding and SMTP
//! submission.
//!
//! Reads one JSON request per line from stdin and writes one JSON response
//! per line to stdout. Requests run concurrently, so responses may arrive out
//! of order; callers correlate them with the `id` field. Logs go to stderr.
//!
//! Usage: `mailbridge [config.json]`

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mailbridge_core::{Bridge, BridgeConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long requests may keep running after stdin closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; stdout carries responses
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mailbridge=info,mailbridge_core=info,mailbridge_smtp=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => BridgeConfig::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    let bridge = Arc::new(Bridge::new(config).context("Invalid configuration")?);

    info!("Starting mailbridge");

    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(write_responses(rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        while tasks.try_join_next().is_some() {}
        if line.trim().is_empty() {
            continue;
        }

        let bridge = Arc::clone(&bridge);
        let tx = tx.clone();
        tasks.spawn(async move {
            let response = bridge.handle_line(&line).await;
            if tx.send(response.to_line()).is_err() {
                tracing::warn!("Response writer is gone");
            }
        });
    }

    info!(pending = tasks.len(), "Input closed, finishing requests");
    if tokio::time::timeout(SHUTDOWN_GRACE, drain(&mut tasks))
        .await
        .is_err()
    {
        tracing::warn!(pending = tasks.len(), "Requests still running, aborting their sessions");
    }
    // Idle sessions get QUIT; sessions still busy are aborted so their
    // requests finish with a transport error.
    bridge.shutdown().await;
    drain(&mut tasks).await;

    drop(tx);
    writer.await.context("Response writer panicked")??;

    info!("mailbridge stopped");
    Ok(())
}

/// Waits for every request task.
async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            tracing::error!(?e, "Request task failed");
        }
    }
}

/// Writes response lines to stdout until every sender is dropped.
async fn write_responses(mut rx: mpsc::UnboundedReceiver<String>) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(line) = rx.recv().await {
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}

//! Support worker
//!
//! Mirrors forum events read from stdin as JSON lines, runs the resolution
//! core on each one, sweeps on a schedule and delivers webhooks in the
//! background.
//!
//! # Usage
//!
//! ```bash
//! # Ingest events and sweep on the configured intervals until interrupted
//! forum-events | support-worker --config support.toml --snapshot forum.json
//!
//! # Run both sweeps once against a snapshot and exit
//! support-worker --snapshot forum.json --once
//!
//! # Verbose logging
//! RUST_LOG=resolution=debug,support_worker=debug support-worker
//! ```

mod ingest;
mod schedule;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use resolution::{MemoryForum, SupportConfig, SupportContext, WebhookDispatcher};
use tokio::io::{stdin, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

use ingest::Worker;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON snapshot of the forum mirror, loaded at start and written on exit
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Run the close-out and ask-user sweeps once, then exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Ingest events only; never sweep on a schedule
    #[arg(long, default_value_t = false)]
    no_schedule: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => SupportConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SupportConfig::default().with_env_overrides(),
    };

    let forum = match &args.snapshot {
        Some(path) => MemoryForum::load_snapshot(path)
            .with_context(|| format!("failed to load snapshot from {}", path.display()))?
            .unwrap_or_default(),
        None => MemoryForum::new(),
    };
    let forum = Arc::new(forum);

    let dispatcher = Arc::new(
        WebhookDispatcher::http(config.webhooks.clone())
            .context("failed to build webhook client")?,
    );
    let sweeps = config.sweeps.clone();
    let ctx = SupportContext::new(forum.clone(), forum.clone(), dispatcher.clone(), config)
        .context("failed to resolve tag vocabulary")?
        .shared();
    let worker = Arc::new(Worker::new(forum, ctx));

    info!(
        snapshot = ?args.snapshot,
        once = args.once,
        schedule = !args.no_schedule,
        "Support worker starting"
    );

    if args.once {
        let w = Arc::clone(&worker);
        let (close_out, ask_user) = tokio::task::spawn_blocking(move || {
            let sweeper = w.sweeper();
            (sweeper.run_close_out_sweep(), sweeper.run_ask_user_sweep())
        })
        .await
        .context("sweep task panicked")?;
        info!(close_out = %close_out.summary(), ask_user = %ask_user.summary(), "Sweeps finished");
    } else {
        let cancel = CancellationToken::new();
        let schedule = (!args.no_schedule).then(|| {
            tokio::spawn(schedule::run(
                Arc::clone(&worker),
                sweeps,
                cancel.clone(),
            ))
        });

        let ingest = ingest::run(BufReader::new(stdin()), Arc::clone(&worker), cancel.clone());
        tokio::pin!(ingest);
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Interrupt received"),
            _ = &mut ingest => {
                if schedule.is_some() {
                    info!("Event stream ended; sweeping until interrupted");
                    tokio::signal::ctrl_c().await?;
                }
            }
        }

        cancel.cancel();
        if let Some(handle) = schedule {
            handle.await.context("sweep schedule panicked")?;
        }
    }

    let delivered = dispatcher.shutdown().await;
    info!(
        delivered = delivered.delivered,
        failed = delivered.failed,
        skipped = delivered.skipped,
        "Webhooks flushed"
    );

    if let Some(path) = &args.snapshot {
        worker
            .forum()
            .save_snapshot(path)
            .with_context(|| format!("failed to save snapshot to {}", path.display()))?;
        info!(path = %path.display(), "Snapshot saved");
    }

    Ok(())
}

//! Periodic sweeps
//!
//! Close-out and ask-user each run on their own interval. The first run of each
//! happens one full period after start; a missed tick is skipped, never replayed.
//! Sweeps block on the forum store, so each run goes to the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use resolution::SweepConfig;
use tokio::task::spawn_blocking;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ingest::Worker;

/// How many times each sweep ran before the schedule stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleStats {
    pub close_out_runs: u32,
    pub ask_user_runs: u32,
}

/// Run both sweeps on their intervals until `cancel` fires.
pub async fn run(
    worker: Arc<Worker>,
    sweeps: SweepConfig,
    cancel: CancellationToken,
) -> ScheduleStats {
    let close_out_every = Duration::from_secs(sweeps.close_out_every_secs.max(1));
    let ask_user_every = Duration::from_secs(sweeps.ask_user_every_secs.max(1));
    let mut close_out = interval_at(Instant::now() + close_out_every, close_out_every);
    let mut ask_user = interval_at(Instant::now() + ask_user_every, ask_user_every);
    close_out.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ask_user.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        close_out_every_secs = close_out_every.as_secs(),
        ask_user_every_secs = ask_user_every.as_secs(),
        "Sweep schedule started"
    );

    let mut stats = ScheduleStats::default();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = close_out.tick() => {
                let w = Arc::clone(&worker);
                if let Err(e) = spawn_blocking(move || w.sweeper().run_close_out_sweep()).await {
                    warn!(error = %e, "Close-out sweep task failed");
                }
                stats.close_out_runs += 1;
            }
            _ = ask_user.tick() => {
                let w = Arc::clone(&worker);
                if let Err(e) = spawn_blocking(move || w.sweeper().run_ask_user_sweep()).await {
                    warn!(error = %e, "Ask-user sweep task failed");
                }
                stats.ask_user_runs += 1;
            }
        }
    }

    info!(
        close_out_runs = stats.close_out_runs,
        ask_user_runs = stats.ask_user_runs,
        "Sweep schedule stopped"
    );
    stats
}

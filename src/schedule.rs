//! Cron scheduling for repeated runs.
//!
//! Runs are strictly sequential within the process: the next fire time is
//! computed only after the previous run returns.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::ConfigError;
use crate::pipeline::runner::JobRunner;

/// Parse a cron expression (seconds field included).
pub fn parse_schedule(expr: &str) -> Result<Schedule, ConfigError> {
    Schedule::from_str(expr).map_err(|e| ConfigError::InvalidValue {
        key: "schedule".into(),
        message: format!("invalid cron: {e}"),
    })
}

/// Next fire time strictly after `after`.
pub fn next_fire(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

/// Spawn a background task that runs `runner` at every fire time.
///
/// Run failures are logged and the loop continues. Returns a `JoinHandle`
/// and a shutdown flag; the flag is checked before each run.
pub fn spawn_scheduled_runner(
    runner: Arc<JobRunner>,
    schedule: Schedule,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!(account = %runner.account(), "Scheduler started");

        loop {
            let now = Utc::now();
            let Some(fire_at) = next_fire(&schedule, now) else {
                info!("Schedule has no further fire times: scheduler stopping");
                return;
            };
            let wait = (fire_at - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Scheduler shutting down");
                return;
            }

            if let Err(e) = runner.run_once().await {
                error!(error = %e, "Scheduled run failed");
            }
        }
    });

    (handle, shutdown_flag)
}

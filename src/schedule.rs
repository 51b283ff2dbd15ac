use crate::{config::Schedule, util::now_rfc3339};
use anyhow::Result;
use std::time::Duration;
use tracing::{error, info};

/// Invoke `job` on a fixed interval. Each call gets its 0-based run index.
///
/// Returns the number of completed invocations once `max_runs` is reached,
/// or the first error when `stop_on_error` is set.
pub fn run_every<F>(cfg: &Schedule, mut job: F) -> Result<u64>
where
    F: FnMut(u64) -> Result<()>,
{
    let interval = Duration::from_secs(cfg.interval_seconds);
    let mut runs = 0u64;

    if !cfg.run_on_start {
        info!("first run in {}s", cfg.interval_seconds);
        std::thread::sleep(interval);
    }

    loop {
        info!("run {} triggered at {}", runs, now_rfc3339());
        match job(runs) {
            Ok(()) => {}
            Err(err) if cfg.stop_on_error => return Err(err),
            Err(err) => error!("run {} failed: {:#}", runs, err),
        }
        runs += 1;

        if cfg.max_runs > 0 && runs >= cfg.max_runs {
            return Ok(runs);
        }
        std::thread::sleep(interval);
    }
}

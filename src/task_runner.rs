//! Periodic Task Runner
//!
//! Runs a background task on a fixed-delay cadence: the delay starts when
//! one iteration ends, so a slow iteration never overlaps the next. A
//! failing iteration is logged and the loop continues; consecutive
//! failures are counted so recovery shows up in the logs.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Run `task_fn` repeatedly until `shutdown` flips to true.
///
/// Shutdown is only observed between iterations, so an in-flight
/// iteration always runs to completion.
pub async fn run_periodic<F, Fut>(
    task_name: &str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut task_fn: F,
) where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), String>>,
{
    let mut consecutive_failures: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        match task_fn().await {
            Ok(()) => {
                if consecutive_failures > 0 {
                    warn!(
                        "Task '{}' recovered after {} failures",
                        task_name, consecutive_failures
                    );
                }
                consecutive_failures = 0;
            }
            Err(e) => {
                consecutive_failures += 1;
                error!(
                    "Task '{}' iteration failed ({} consecutive): {}",
                    task_name, consecutive_failures, e
                );
            }
        }

        tokio::select! {
            _ = sleep(period) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Task '{}' stopped", task_name);
}

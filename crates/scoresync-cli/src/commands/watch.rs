use std::thread;
use std::time::Duration;

use scoresync_core::MessageLog;
use scoresync_core::Reconciler;
use scoresync_core::error::ErrorPayload;
use scoresync_core::models::Trigger;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Default, Serialize)]
pub(super) struct WatchReport {
    pub cycles: u32,
    pub succeeded: u32,
    pub failed_cycles: u32,
    pub drift: usize,
    pub pending: usize,
    pub invalid_score: usize,
    pub errors: Vec<ErrorPayload>,
}

/// Runs reminder-triggered cycles every `interval_secs` until `max_cycles`
/// is reached; `0` keeps going. A failed cycle is recorded and the loop moves on.
pub(super) fn run_watch<L: MessageLog>(
    reconciler: &Reconciler<L>,
    interval_secs: u64,
    max_cycles: u32,
) -> WatchReport {
    let mut total = WatchReport::default();
    let cancel = reconciler.cancel_handle();

    loop {
        if max_cycles > 0 && total.cycles >= max_cycles {
            break;
        }
        total.cycles += 1;

        match reconciler.run(Trigger::Reminder) {
            Ok(report) => {
                total.succeeded += 1;
                total.drift += report.drift_count();
                total.pending += report.pending;
                total.invalid_score += report.invalid_score;
            }
            Err(err) => {
                total.failed_cycles += 1;
                warn!(cycle = total.cycles, error = %err, "watch cycle failed");
                total.errors.push(err.to_payload("reconcile.run", None));
            }
        }
        if cancel.is_cancelled() {
            info!(cycle = total.cycles, "watch stopped by cancel");
            break;
        }
        if max_cycles > 0 && total.cycles >= max_cycles {
            break;
        }

        thread::sleep(Duration::from_secs(interval_secs));
    }

    total
}

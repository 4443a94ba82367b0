//! Periodic tick driver
//!
//! One task per run. It fires on a fixed period and hands each firing to
//! [`RunShared::tick`]; it never samples the clock to decide what the state
//! should be, so a late consumer gets every tick, just later.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use super::handle::RunShared;

/// Spawns the driver for `shared` on `runtime`.
///
/// The first tick fires one `period` after this call.
pub(crate) fn spawn(runtime: &Handle, shared: Arc<RunShared>, period: Duration) -> JoinHandle<()> {
    let first = Instant::now() + period;
    runtime.spawn(drive(shared, first, period))
}

async fn drive(shared: Arc<RunShared>, first: Instant, period: Duration) {
    let token = shared.token().clone();
    let mut interval = time::interval_at(first, period);
    // Fire every missed tick rather than skipping seconds.
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = interval.tick() => {
                if !shared.tick() {
                    break;
                }
            }
        }
    }

    debug!(run_id = shared.id(), "tick driver stopped");
}

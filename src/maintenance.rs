//! Background maintenance tasks.
//!
//! Three independent periodic tasks keep the duplicate-detection store
//! moving while packets flow:
//!
//! - the local sequence counter advances every increment period
//! - the writable shard rotates every rotation period
//! - neighbor TTLs are swept every TTL check period
//!
//! Each task stops when the shutdown token is cancelled. A panic inside one
//! tick is logged and the task keeps running.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::TimerConfig;
use crate::digest::DigestStore;

/// Periods driving the maintenance tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaintenanceTimers {
    pub increment_period: Duration,
    pub rotation_period: Duration,
    pub ttl_check_period: Duration,
}

impl MaintenanceTimers {
    pub fn from_config(timers: &TimerConfig) -> Self {
        Self {
            increment_period: timers.increment_period(),
            rotation_period: timers.rotation_period(),
            ttl_check_period: timers.ttl_check_period(),
        }
    }
}

impl Default for MaintenanceTimers {
    fn default() -> Self {
        Self::from_config(&TimerConfig::default())
    }
}

/// Spawn all maintenance tasks on the current runtime.
pub fn spawn_all(
    store: Arc<DigestStore>,
    timers: MaintenanceTimers,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    debug!(?timers, "Starting maintenance tasks");

    let counter_store = store.clone();
    let counter = tokio::spawn(run_periodic(
        "counter",
        timers.increment_period,
        MissedTickBehavior::Burst,
        shutdown.clone(),
        move |_| {
            let seq = counter_store.tick_local_sequence();
            trace!(seq, "Local sequence advanced");
        },
    ));

    let rotate_store = store.clone();
    let rotation = tokio::spawn(run_periodic(
        "rotation",
        timers.rotation_period,
        MissedTickBehavior::Delay,
        shutdown.clone(),
        move |_| {
            rotate_store.rotate();
        },
    ));

    let sweep = tokio::spawn(run_periodic(
        "ttl-sweep",
        timers.ttl_check_period,
        MissedTickBehavior::Delay,
        shutdown,
        move |elapsed| {
            let advanced = store.sweep_ttl(elapsed);
            if advanced > 0 {
                trace!(advanced, "Neighbor marks advanced on TTL expiry");
            }
        },
    ));

    vec![counter, rotation, sweep]
}

/// Run `tick` every `period` until `shutdown` is cancelled.
///
/// `tick` receives the time actually elapsed since the previous tick.
async fn run_periodic<F>(
    name: &'static str,
    period: Duration,
    missed: MissedTickBehavior,
    shutdown: CancellationToken,
    mut tick: F,
) where
    F: FnMut(Duration) + Send,
{
    let mut last = Instant::now();
    let mut interval = interval_at(last + period, period);
    interval.set_missed_tick_behavior(missed);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                trace!(task = name, "Maintenance task received shutdown");
                break;
            }
            now = interval.tick() => {
                let elapsed = now.saturating_duration_since(last);
                last = now;
                if catch_unwind(AssertUnwindSafe(|| tick(elapsed))).is_err() {
                    warn!(task = name, "Maintenance tick panicked, continuing");
                }
            }
        }
    }
    debug!(task = name, "Maintenance task exiting");
}

//! Keepalive scheduler.
//!
//! One task per open socket, ticking at a fixed interval. Each tick asks the
//! probe to send a keepalive frame; the probe returns `false` once the
//! socket it belongs to is gone, which ends the task. The connection also
//! aborts the task when the socket closes, so a stale tick never fires.

use crate::config::MIN_KEEPALIVE_INTERVAL;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Spawn the scheduler. The first probe goes out one `interval` after the
/// call, not immediately. `interval` is raised to at least
/// [`MIN_KEEPALIVE_INTERVAL`].
pub(crate) fn spawn<P>(interval: Duration, mut probe: P) -> JoinHandle<()>
where
    P: FnMut() -> bool + Send + 'static,
{
    let interval = interval.max(MIN_KEEPALIVE_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !probe() {
                tracing::debug!("keepalive stopped");
                break;
            }
        }
    })
}

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Interval between Ping frames on every WebSocket connection.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// A ticker whose first tick fires one full period from now.
pub(crate) fn heartbeat(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

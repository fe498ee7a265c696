pub mod cache;

pub use cache::PressureCache;

use std::time::Duration;

/// Poll period used by the dashboard and the `store` command.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(400);

/// Snapshots kept in memory by default.
pub const DEFAULT_HISTORY_RETENTION: usize = 75;

/// How long `stop()` waits for the poll loop before aborting it.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

//! Progress reporting for indexing runs.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};

/// Snapshot of an indexing run, broadcast to subscribers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexProgress {
    /// Unique objects added to the catalog so far.
    pub entries_cataloged: u64,
    /// Directories opened so far, including the root.
    pub directories: u64,
    /// Entries skipped because their device and inode were already cataloged.
    pub aliases_skipped: u64,
    /// Permission-denied entries skipped so far.
    pub warnings: u64,
    /// Time elapsed since the run started.
    pub elapsed: Duration,
}

impl IndexProgress {
    /// Catalog rate in entries per second.
    pub fn entries_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.entries_cataloged as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Block until the next snapshot arrives.
///
/// Snapshots dropped because the receiver fell behind are skipped. Returns
/// `None` once every sender is gone.
pub fn next_progress(rx: &mut broadcast::Receiver<IndexProgress>) -> Option<IndexProgress> {
    loop {
        match rx.blocking_recv() {
            Ok(progress) => return Some(progress),
            Err(RecvError::Lagged(skipped)) => {
                tracing::trace!(skipped, "Progress receiver lagged");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

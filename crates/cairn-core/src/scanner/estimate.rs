use super::walk::TreeWalker;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Count files under the walker's root on a background thread, waiting at most `timeout`.
///
/// Returns `None` when counting did not finish in time (or the root could not
/// be walked); the caller then proceeds without a known total. A count that
/// arrives after the deadline is dropped with the channel.
pub fn estimate_file_count(walker: &TreeWalker, timeout: Duration) -> Option<u64> {
    let (tx, rx) = mpsc::sync_channel::<Option<u64>>(1);
    let walker = walker.clone();

    let spawned = thread::Builder::new()
        .name("cairn-count".to_string())
        .spawn(move || {
            let count = walker
                .walk()
                .ok()
                .map(|entries| entries.filter(|e| !e.is_dir).count() as u64);
            let _ = tx.send(count);
        });
    if let Err(e) = spawned {
        warn!("Could not start counting thread: {}", e);
        return None;
    }

    match rx.recv_timeout(timeout) {
        Ok(count) => {
            debug!("Counted {:?} files before walking", count);
            count
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!(
                "File counting timed out after {:.0}s, continuing with indeterminate progress",
                timeout.as_secs_f64()
            );
            None
        }
        Err(RecvTimeoutError::Disconnected) => None,
    }
}

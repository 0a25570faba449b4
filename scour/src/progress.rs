//! Optional progress reporting for a search run.
//!
//! Counters are owned by the run, written by the traversal and worker
//! threads, and read by a background reporter thread. Reporting is
//! observational only; the reporter is stopped and joined before the run
//! returns.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Reporter update cadence.
const TICK_INTERVAL: Duration = Duration::from_millis(350);

/// Run-scoped counters shared across the traversal and worker threads.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    /// Directory entries enumerated so far.
    pub entries_seen: AtomicU64,
    /// Content-scan tasks completed so far.
    pub files_processed: AtomicU64,
}

impl ProgressCounters {
    pub fn record_entry(&self) {
        self.entries_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_processed(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn entries_seen(&self) -> u64 {
        self.entries_seen.load(Ordering::Relaxed)
    }

    pub fn files_processed(&self) -> u64 {
        self.files_processed.load(Ordering::Relaxed)
    }
}

/// Background status-line reporter over a set of [`ProgressCounters`].
pub struct ProgressReporter {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Spawns the reporter thread.
    pub fn start(counters: Arc<ProgressCounters>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("scour-progress".to_string())
            .spawn(move || {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} {msg}")
                        .expect("invalid progress template"),
                );
                while !stop_flag.load(Ordering::SeqCst) {
                    bar.set_message(format!(
                        "scanned: {} entries, processed files: {}",
                        counters.entries_seen(),
                        counters.files_processed()
                    ));
                    bar.tick();
                    thread::sleep(TICK_INTERVAL);
                }
                bar.finish_and_clear();
            })
            .expect("failed to spawn progress thread");

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stops the reporter and waits for its thread to exit.
    pub fn stop(mut self) {
        self.signal_and_join();
    }

    fn signal_and_join(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.signal_and_join();
    }
}

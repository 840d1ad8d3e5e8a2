//! Parallel draining of a source iterator into a target store
//!
//! A fixed pool of workers pulls records from the shared iterator and
//! hands each to the target's `import`. Each record is owned end-to-end
//! by exactly one worker. The interruption flag is consulted before each
//! pull, never mid-import.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use tracing::{debug, error, warn};

use crate::fsio::FileStreamProvider;
use crate::signal::InterruptFlag;
use crate::store::{StateIterator, StateStore, StoreError};
use crate::torrent::TorrentBox;

/// Per-run outcome counters; their sum equals the number of records
/// drained from the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrateResult {
    pub success_count: usize,
    pub skip_count: usize,
    pub fail_count: usize,
}

/// Drains `boxes` into `target` using `worker_count` threads.
pub fn run_import(
    target: &dyn StateStore,
    target_dir: &Path,
    boxes: &dyn StateIterator,
    streams: &dyn FileStreamProvider,
    interrupt: &InterruptFlag,
    worker_count: usize,
) -> MigrateResult {
    let success = AtomicUsize::new(0);
    let skip = AtomicUsize::new(0);
    let fail = AtomicUsize::new(0);

    let workers = worker_count.max(1);

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                worker_loop(
                    target, target_dir, boxes, streams, interrupt, &success, &skip, &fail,
                )
            });
        }
    });

    MigrateResult {
        success_count: success.load(Ordering::SeqCst),
        skip_count: skip.load(Ordering::SeqCst),
        fail_count: fail.load(Ordering::SeqCst),
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    target: &dyn StateStore,
    target_dir: &Path,
    boxes: &dyn StateIterator,
    streams: &dyn FileStreamProvider,
    interrupt: &InterruptFlag,
    success: &AtomicUsize,
    skip: &AtomicUsize,
    fail: &AtomicUsize,
) {
    while !interrupt.is_interrupted() {
        let record = match boxes.next() {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(e) => {
                // A corrupt torrent must not end the run; move on to the
                // next record.
                fail.fetch_add(1, Ordering::SeqCst);
                error!("export failed: {}", e);
                continue;
            }
        };

        let label = record_label(&record);
        debug!("[{}] import started", label);

        match target.import(target_dir, &record, streams) {
            Ok(()) => {
                success.fetch_add(1, Ordering::SeqCst);
                debug!("[{}] import finished", label);
            }
            Err(StoreError::ImportCancelled(reason)) => {
                skip.fetch_add(1, Ordering::SeqCst);
                warn!("[{}] import cancelled: {}", label, reason);
            }
            Err(e) => {
                fail.fetch_add(1, Ordering::SeqCst);
                error!("[{}] import failed: {}", label, e);
            }
        }
    }
}

fn record_label(record: &TorrentBox) -> String {
    match record.save_path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => record.torrent.info_hash().to_hex(),
    }
}

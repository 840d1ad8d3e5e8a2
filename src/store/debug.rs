use tracing::debug;

use crate::torrent::TorrentBox;

use super::{StateIterator, StoreError};

/// Decorates an iterator, logging every record pulled through it.
pub struct DebugStateIterator<'a> {
    inner: Box<dyn StateIterator + 'a>,
}

impl<'a> DebugStateIterator<'a> {
    pub fn new(inner: Box<dyn StateIterator + 'a>) -> Self {
        Self { inner }
    }
}

impl StateIterator for DebugStateIterator<'_> {
    fn next(&self) -> Result<Option<TorrentBox>, StoreError> {
        let record = self.inner.next()?;

        if let Some(record) = &record {
            debug!(
                info_hash = %record.torrent.info_hash(),
                added_at = record.added_at,
                completed_at = record.completed_at,
                is_paused = record.is_paused,
                downloaded = record.downloaded_size,
                uploaded = record.uploaded_size,
                corrupted = record.corrupted_size,
                save_path = %record.save_path.display(),
                block_size = record.block_size,
                files = record.files.len(),
                pieces = record.valid_blocks.len(),
                valid_pieces = record.valid_blocks.iter().filter(|b| **b).count(),
                tracker_tiers = record.trackers.len(),
                "exported torrent state"
            );
        }

        Ok(record)
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

use crate::bencode;
use crate::fsio::{FileStreamProvider, IoFailure};
use crate::torrent::{
    priority_from_store, FileInfo, TorrentBox, TorrentError, TorrentInfo, NORMAL_PRIORITY,
};

use super::{
    bytes_field, int_field, list_field, store_path, uint_field, Intention, StateIterator,
    StateStore, StoreError, TorrentClient,
};

const CONFIG_FILENAME: &str = ".rtorrent.rc";
const STATE_EXTENSION: &str = "rtorrent";
const RESUME_EXTENSION: &str = "libtorrent_resume";

const MIN_PRIORITY: i32 = -1;
const MAX_PRIORITY: i32 = 1;
const DO_NOT_DOWNLOAD_PRIORITY: i64 = 0;

/// Reads rTorrent session state: one `<hash>.torrent` per torrent with
/// `.rtorrent` and `.libtorrent_resume` sidecars in the session
/// directory.
pub struct RtorrentStateStore;

impl StateStore for RtorrentStateStore {
    fn client(&self) -> TorrentClient {
        TorrentClient::Rtorrent
    }

    fn guess_data_dir(&self, intention: Intention) -> Option<PathBuf> {
        let config_path = super::home_dir()?.join(CONFIG_FILENAME);
        let config = fs::read_to_string(config_path).ok()?;
        let session_dir = session_dir_from_config(&config)?;
        self.is_valid_data_dir(&session_dir, intention)
            .then_some(session_dir)
    }

    fn is_valid_data_dir(&self, data_dir: &Path, intention: Intention) -> bool {
        if intention == Intention::Import {
            return data_dir.is_dir();
        }

        let Ok(entries) = fs::read_dir(data_dir) else {
            return false;
        };

        entries
            .filter_map(|entry| entry.ok())
            .any(|entry| sibling_paths(&entry.path()).is_some())
    }

    fn export<'a>(
        &'a self,
        data_dir: &Path,
        streams: &'a dyn FileStreamProvider,
    ) -> Result<Box<dyn StateIterator + 'a>, StoreError> {
        let entries = fs::read_dir(data_dir).map_err(|e| IoFailure::new(data_dir, e))?;

        Ok(Box::new(RtorrentIterator {
            data_dir: data_dir.to_owned(),
            entries: Mutex::new(entries),
            streams,
        }))
    }

    fn import(
        &self,
        _data_dir: &Path,
        _record: &TorrentBox,
        _streams: &dyn FileStreamProvider,
    ) -> Result<(), StoreError> {
        Err(StoreError::NotImplemented("rTorrent import"))
    }
}

/// Extracts the session directory from a `.rtorrent.rc` line of the form
/// `session = <dir>`, skipping comments.
fn session_dir_from_config(config: &str) -> Option<PathBuf> {
    for line in config.lines() {
        let line = line.trim_start();
        if line.starts_with('#') {
            continue;
        }
        let Some(rest) = line.strip_prefix("session") else {
            continue;
        };
        let rest = rest.trim_start();
        let Some(value) = rest.strip_prefix('=') else {
            continue;
        };
        let value = value.trim();
        if !value.is_empty() {
            return Some(PathBuf::from(value));
        }
    }
    None
}

/// For a candidate `.rtorrent` state file, returns the sibling torrent
/// and resume paths if the trio is complete.
fn sibling_paths(state_path: &Path) -> Option<(PathBuf, PathBuf)> {
    if state_path.extension()?.to_str()? != STATE_EXTENSION || !state_path.is_file() {
        return None;
    }

    let torrent_path = state_path.with_extension("");
    if !torrent_path.is_file() {
        return None;
    }

    let resume_path = state_path.with_extension(RESUME_EXTENSION);
    if !resume_path.is_file() {
        return None;
    }

    Some((torrent_path, resume_path))
}

struct RtorrentIterator<'a> {
    data_dir: PathBuf,
    entries: Mutex<fs::ReadDir>,
    streams: &'a dyn FileStreamProvider,
}

impl RtorrentIterator<'_> {
    /// Advances the directory cursor to the next complete state-file
    /// trio. Incomplete sets are logged and skipped.
    fn next_trio(&self) -> Result<Option<(PathBuf, PathBuf, PathBuf)>, StoreError> {
        let mut entries = self.entries.lock();

        while let Some(entry) = entries.next() {
            let entry = entry.map_err(|e| IoFailure::new(&self.data_dir, e))?;
            let state_path = entry.path();

            if state_path.extension().and_then(|e| e.to_str()) != Some(STATE_EXTENSION) {
                continue;
            }
            if !state_path.is_file() {
                warn!(
                    "\"{}\" is not a regular file, skipping",
                    state_path.display()
                );
                continue;
            }

            let torrent_path = state_path.with_extension("");
            if !torrent_path.is_file() {
                warn!(
                    "\"{}\" is not a regular file, skipping",
                    torrent_path.display()
                );
                continue;
            }

            let resume_path = state_path.with_extension(RESUME_EXTENSION);
            if !resume_path.is_file() {
                warn!(
                    "\"{}\" is not a regular file, skipping",
                    resume_path.display()
                );
                continue;
            }

            return Ok(Some((state_path, torrent_path, resume_path)));
        }

        Ok(None)
    }
}

impl StateIterator for RtorrentIterator<'_> {
    fn next(&self) -> Result<Option<TorrentBox>, StoreError> {
        let Some((state_path, torrent_path, resume_path)) = self.next_trio()? else {
            return Ok(None);
        };

        let torrent = TorrentInfo::decode_from(self.streams.read_stream(&torrent_path)?)?;

        // The torrent file is named after its own info hash.
        let stem = torrent_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if !torrent.info_hash().eq_hex_ignore_case(stem) {
            return Err(TorrentError::InfoHashMismatch {
                expected: stem.to_owned(),
                actual: torrent.info_hash().to_hex(),
            }
            .into());
        }

        let state = bencode::decode_from(self.streams.read_stream(&state_path)?)?;
        let resume = bencode::decode_from(self.streams.read_stream(&resume_path)?)?;

        let mut record = TorrentBox::new(torrent);
        record.added_at = int_field(&state, "timestamp.started")?;
        record.completed_at = int_field(&state, "timestamp.finished")?;
        record.is_paused = int_field(&state, "priority")? == 0;
        record.uploaded_size = uint_field(&state, "total_uploaded")?;
        record.save_path = store_path(bytes_field(&state, "directory")?);
        record.block_size = record.torrent.piece_size()?;

        let files = list_field(&resume, "files")?;
        record.files.reserve(files.len());
        for file in files {
            let priority = int_field(file, "priority")?;
            let do_not_download = priority == DO_NOT_DOWNLOAD_PRIORITY;

            record.files.push(FileInfo {
                do_not_download,
                priority: if do_not_download {
                    NORMAL_PRIORITY
                } else {
                    priority_from_store(priority as i32 - 1, MIN_PRIORITY, MAX_PRIORITY)
                },
                path: None,
            });
        }

        // MSB-first piece flags, with pad bits in the final byte dropped
        // by the truncation below.
        let piece_count = record.torrent.piece_count()? as usize;
        let bitfield = bytes_field(&resume, "bitfield")?;
        record.valid_blocks.reserve(piece_count + 8);
        for byte in bitfield.iter() {
            for bit in (0..8).rev() {
                record.valid_blocks.push(byte & (1 << bit) != 0);
            }
        }
        record.valid_blocks.resize(piece_count, false);

        if let Some(trackers) = resume.get(b"trackers").and_then(|v| v.as_dict()) {
            for (url, params) in trackers {
                if url.as_ref() == b"dht://" {
                    continue;
                }
                if int_field(params, "enabled")? != 1 {
                    continue;
                }
                record
                    .trackers
                    .push(vec![String::from_utf8_lossy(url).into_owned()]);
            }
        }

        Ok(Some(record))
    }
}

#[cfg(test)]
mod config_tests {
    use super::session_dir_from_config;
    use std::path::PathBuf;

    #[test]
    fn parses_session_line() {
        let config = "# comment\nupload_rate = 100\nsession = /home/user/.session\n";
        assert_eq!(
            session_dir_from_config(config),
            Some(PathBuf::from("/home/user/.session"))
        );
    }

    #[test]
    fn ignores_commented_session_line() {
        let config = "# session = /tmp/nope\n";
        assert_eq!(session_dir_from_config(config), None);
    }
}

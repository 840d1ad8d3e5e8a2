use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::bencode::{self, Value};
use crate::fsio::FileStreamProvider;
use crate::pickle;
use crate::torrent::{
    priority_from_store, FileInfo, LimitInfo, LimitMode, TorrentBox, TorrentError, TorrentInfo,
    NORMAL_PRIORITY,
};

use super::{
    bool_field, bytes_field, float_field, int_field, list_field, store_path, str_field,
    uint_field, Intention, StateIterator, StateStore, StoreError, TorrentClient,
};

const DATA_DIR_NAME: &str = "deluge";
const FAST_RESUME_FILENAME: &str = "torrents.fastresume";
const STATE_FILENAME: &str = "torrents.state";

const MIN_PRIORITY: i32 = -6;
const MAX_PRIORITY: i32 = 6;
const DO_NOT_DOWNLOAD_PRIORITY: i64 = 0;

fn state_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("state")
}

/// Reads Deluge state: a bencoded `torrents.fastresume` aggregate plus a
/// pickled `torrents.state`, with one `<info_hash>.torrent` per torrent
/// beside them.
pub struct DelugeStateStore;

impl StateStore for DelugeStateStore {
    fn client(&self) -> TorrentClient {
        TorrentClient::Deluge
    }

    fn guess_data_dir(&self, intention: Intention) -> Option<PathBuf> {
        let candidate = super::config_home()?.join(DATA_DIR_NAME);
        self.is_valid_data_dir(&candidate, intention)
            .then_some(candidate)
    }

    fn is_valid_data_dir(&self, data_dir: &Path, _intention: Intention) -> bool {
        let state_dir = state_dir(data_dir);
        state_dir.join(FAST_RESUME_FILENAME).is_file() && state_dir.join(STATE_FILENAME).is_file()
    }

    fn export<'a>(
        &'a self,
        data_dir: &Path,
        streams: &'a dyn FileStreamProvider,
    ) -> Result<Box<dyn StateIterator + 'a>, StoreError> {
        let state_dir = state_dir(data_dir);

        debug!("[Deluge] loading {}", FAST_RESUME_FILENAME);
        let fast_resume =
            bencode::decode_from(streams.read_stream(&state_dir.join(FAST_RESUME_FILENAME))?)?;

        debug!("[Deluge] loading {}", STATE_FILENAME);
        let state = pickle::decode_from(streams.read_stream(&state_dir.join(STATE_FILENAME))?)?;

        let torrents = list_field(&state, "torrents")?.clone();

        Ok(Box::new(DelugeIterator {
            state_dir,
            fast_resume,
            torrents,
            streams,
            cursor: Mutex::new(0),
        }))
    }

    fn import(
        &self,
        _data_dir: &Path,
        _record: &TorrentBox,
        _streams: &dyn FileStreamProvider,
    ) -> Result<(), StoreError> {
        Err(StoreError::NotImplemented("Deluge import"))
    }
}

struct DelugeIterator<'a> {
    state_dir: PathBuf,
    fast_resume: Value,
    torrents: Vec<Value>,
    streams: &'a dyn FileStreamProvider,
    cursor: Mutex<usize>,
}

impl StateIterator for DelugeIterator<'_> {
    fn next(&self) -> Result<Option<TorrentBox>, StoreError> {
        let state = {
            let mut cursor = self.cursor.lock();
            match self.torrents.get(*cursor) {
                None => return Ok(None),
                Some(state) => {
                    *cursor += 1;
                    state
                }
            }
        };

        let info_hash = str_field(state, "torrent_id")?;

        let resume_blob = self
            .fast_resume
            .get(info_hash.as_bytes())
            .and_then(|v| v.as_bytes())
            .ok_or(StoreError::MissingField("torrent fast-resume entry"))?;
        let fast_resume = bencode::decode(resume_blob)?;

        let torrent = TorrentInfo::decode_from(
            self.streams
                .read_stream(&self.state_dir.join(format!("{}.torrent", info_hash)))?,
        )?;

        if !torrent.info_hash().eq_hex(info_hash) {
            return Err(TorrentError::InfoHashMismatch {
                expected: info_hash.to_owned(),
                actual: torrent.info_hash().to_hex(),
            }
            .into());
        }

        let mapped_files = fast_resume.get(b"mapped_files").and_then(|v| v.as_list());

        let save_root = match mapped_files.and_then(|files| files.first()) {
            Some(first) => {
                let mapped = store_path(
                    first
                        .as_bytes()
                        .ok_or(StoreError::InvalidField("mapped_files"))?,
                );
                match mapped.components().next() {
                    Some(root) => PathBuf::from(root.as_os_str()),
                    None => return Err(StoreError::InvalidField("mapped_files")),
                }
            }
            None => crate::fsio::bytes_to_path(torrent.name()?),
        };

        let mut record = TorrentBox::new(torrent);
        record.added_at = int_field(&fast_resume, "added_time")?;
        record.completed_at = int_field(&fast_resume, "completed_time")?;
        record.is_paused = bool_field(state, "paused")?;
        record.downloaded_size = uint_field(&fast_resume, "total_downloaded")?;
        record.uploaded_size = uint_field(&fast_resume, "total_uploaded")?;
        record.corrupted_size = 0;
        record.save_path = store_path(bytes_field(state, "save_path")?).join(save_root);
        record.block_size = record.torrent.piece_size()?;
        record.ratio_limit = ratio_limit(state)?;
        record.download_speed_limit = speed_limit(state, "max_download_speed")?;
        record.upload_speed_limit = speed_limit(state, "max_upload_speed")?;

        let priorities = list_field(state, "file_priorities")?;
        record.files.reserve(priorities.len());
        for (index, priority) in priorities.iter().enumerate() {
            let priority = priority
                .as_integer()
                .ok_or(StoreError::InvalidField("file_priorities"))?;
            let do_not_download = priority == DO_NOT_DOWNLOAD_PRIORITY;

            let changed = changed_file_path(mapped_files, index)?;
            let original = record.torrent.file_path(index)?;

            record.files.push(FileInfo {
                do_not_download,
                priority: if do_not_download {
                    NORMAL_PRIORITY
                } else {
                    priority_from_store(priority as i32 - 1, MIN_PRIORITY, MAX_PRIORITY)
                },
                path: changed.filter(|path| *path != original),
            });
        }

        let pieces = bytes_field(&fast_resume, "pieces")?;
        record.valid_blocks = pieces.iter().map(|&byte| byte != 0).collect();
        record
            .valid_blocks
            .resize(record.torrent.piece_count()? as usize, false);

        for tracker in list_field(state, "trackers")? {
            let tier = uint_field(tracker, "tier")? as usize;
            let url = str_field(tracker, "url")?.to_owned();

            if record.trackers.len() <= tier {
                record.trackers.resize(tier + 1, Vec::new());
            }
            record.trackers[tier].push(url);
        }

        Ok(Some(record))
    }
}

fn ratio_limit(state: &Value) -> Result<LimitInfo, StoreError> {
    Ok(LimitInfo {
        mode: if bool_field(state, "stop_at_ratio")? {
            LimitMode::Enabled
        } else {
            LimitMode::Inherit
        },
        value: float_field(state, "stop_ratio")?,
    })
}

fn speed_limit(state: &Value, key: &'static str) -> Result<LimitInfo, StoreError> {
    let raw = float_field(state, key)?;
    Ok(LimitInfo {
        mode: if raw > 0.0 {
            LimitMode::Enabled
        } else if raw == 0.0 {
            LimitMode::Disabled
        } else {
            LimitMode::Inherit
        },
        value: (raw * 1000.0).max(0.0),
    })
}

/// The in-download path Deluge moved file `index` to, stripped of the
/// leading torrent-root component.
fn changed_file_path(
    mapped_files: Option<&Vec<Value>>,
    index: usize,
) -> Result<Option<PathBuf>, StoreError> {
    let Some(files) = mapped_files else {
        return Ok(None);
    };
    let Some(mapped) = files.get(index) else {
        return Ok(None);
    };

    let path = store_path(
        mapped
            .as_bytes()
            .ok_or(StoreError::InvalidField("mapped_files"))?,
    );
    let rest: PathBuf = path.components().skip(1).collect();

    Ok((!rest.as_os_str().is_empty()).then_some(rest))
}

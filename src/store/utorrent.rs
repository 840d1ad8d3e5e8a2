use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use crate::bencode::{self, Value};
use crate::fsio::FileStreamProvider;
use crate::torrent::{
    priority_from_store, FileInfo, LimitInfo, LimitMode, TorrentBox, TorrentInfo, NORMAL_PRIORITY,
};

use super::{
    bytes_field, int_field, store_path, uint_field, Intention, StateIterator, StateStore,
    StoreError, TorrentClient,
};

const RESUME_FILENAME: &str = "resume.dat";
const TORRENT_EXTENSION: &[u8] = b".torrent";

const MIN_PRIORITY: i32 = 4;
const MAX_PRIORITY: i32 = 12;

// resume.dat `started` states
const STOPPED_STATE: i64 = 0;
const PAUSED_STATE: i64 = 3;

/// Reads uTorrent state: a single bencoded `resume.dat` keyed by torrent
/// file name, with the `.torrent` files beside it.
pub struct UtorrentStateStore;

impl StateStore for UtorrentStateStore {
    fn client(&self) -> TorrentClient {
        TorrentClient::Utorrent
    }

    #[cfg(windows)]
    fn guess_data_dir(&self, intention: Intention) -> Option<PathBuf> {
        let app_data = std::env::var("APPDATA").ok()?;
        let candidate = PathBuf::from(app_data).join("uTorrent");
        self.is_valid_data_dir(&candidate, intention)
            .then_some(candidate)
    }

    #[cfg(not(windows))]
    fn guess_data_dir(&self, _intention: Intention) -> Option<PathBuf> {
        None
    }

    fn is_valid_data_dir(&self, data_dir: &Path, _intention: Intention) -> bool {
        data_dir.join(RESUME_FILENAME).is_file()
    }

    fn export<'a>(
        &'a self,
        data_dir: &Path,
        streams: &'a dyn FileStreamProvider,
    ) -> Result<Box<dyn StateIterator + 'a>, StoreError> {
        debug!("[uTorrent] loading {}", RESUME_FILENAME);

        let resume =
            bencode::decode_from(streams.read_stream(&data_dir.join(RESUME_FILENAME))?)?;

        // Keys that name a torrent file are torrents; the rest
        // (".fileguard", "rec" and friends) are settings metadata.
        let keys: Vec<Bytes> = resume
            .as_dict()
            .map(|dict| {
                dict.keys()
                    .filter(|key| key.ends_with(TORRENT_EXTENSION))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(Box::new(UtorrentIterator {
            data_dir: data_dir.to_owned(),
            resume,
            keys,
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
        Err(StoreError::NotImplemented("uTorrent import"))
    }
}

struct UtorrentIterator<'a> {
    data_dir: PathBuf,
    resume: Value,
    keys: Vec<Bytes>,
    streams: &'a dyn FileStreamProvider,
    cursor: Mutex<usize>,
}

impl StateIterator for UtorrentIterator<'_> {
    fn next(&self) -> Result<Option<TorrentBox>, StoreError> {
        let key = {
            let mut cursor = self.cursor.lock();
            match self.keys.get(*cursor) {
                None => return Ok(None),
                Some(key) => {
                    *cursor += 1;
                    key
                }
            }
        };

        let resume = self
            .resume
            .get(key)
            .ok_or(StoreError::MissingField("resume entry"))?;

        let torrent_path = self.data_dir.join(store_path(key));
        let torrent = TorrentInfo::decode_from(self.streams.read_stream(&torrent_path)?)?;

        let started = int_field(resume, "started")?;

        let mut record = TorrentBox::new(torrent);
        record.added_at = int_field(resume, "added_on")?;
        record.completed_at = int_field(resume, "completed_on")?;
        record.is_paused = started == PAUSED_STATE || started == STOPPED_STATE;
        record.downloaded_size = uint_field(resume, "downloaded")?;
        record.uploaded_size = uint_field(resume, "uploaded")?;
        record.corrupted_size = uint_field(resume, "corrupt")?;
        record.save_path = store_path(bytes_field(resume, "path")?);
        record.block_size = record.torrent.piece_size()?;
        record.ratio_limit = ratio_limit(resume)?;
        record.download_speed_limit = speed_limit(resume, "downspeed")?;
        record.upload_speed_limit = speed_limit(resume, "upspeed")?;

        if let Some(caption) = resume.get(b"caption").and_then(|v| v.as_bytes()) {
            record.caption = caption.clone();
        }

        let priorities = bytes_field(resume, "prio")?;
        let targets = resume.get(b"targets").and_then(|v| v.as_list());
        record.files.reserve(priorities.len());
        for (index, &priority) in priorities.iter().enumerate() {
            let priority = priority as i8;
            let do_not_download = priority <= 0;

            record.files.push(FileInfo {
                do_not_download,
                priority: if do_not_download {
                    NORMAL_PRIORITY
                } else {
                    priority_from_store(i32::from(priority), MIN_PRIORITY, MAX_PRIORITY)
                },
                path: changed_file_path(targets, index)?,
            });
        }

        // LSB-first piece flags.
        let piece_count = record.torrent.piece_count()? as usize;
        let have = bytes_field(resume, "have")?;
        record.valid_blocks.reserve(piece_count + 8);
        for byte in have.iter() {
            for bit in 0..8 {
                record.valid_blocks.push(byte & (1 << bit) != 0);
            }
        }
        record.valid_blocks.resize(piece_count, false);

        if let Some(trackers) = resume.get(b"trackers").and_then(|v| v.as_list()) {
            for tracker in trackers {
                let url = tracker
                    .as_str()
                    .ok_or(StoreError::InvalidField("trackers"))?;
                record.trackers.push(vec![url.to_owned()]);
            }
        }

        Ok(Some(record))
    }
}

fn ratio_limit(resume: &Value) -> Result<LimitInfo, StoreError> {
    Ok(LimitInfo {
        mode: if int_field(resume, "override_seedsettings")? != 0 {
            LimitMode::Enabled
        } else {
            LimitMode::Inherit
        },
        value: int_field(resume, "wanted_ratio")? as f64 / 1000.0,
    })
}

fn speed_limit(resume: &Value, key: &'static str) -> Result<LimitInfo, StoreError> {
    let raw = int_field(resume, key)?;
    Ok(LimitInfo {
        mode: if raw > 0 {
            LimitMode::Enabled
        } else {
            LimitMode::Inherit
        },
        value: raw as f64,
    })
}

/// Looks up the `[index, path]` pair in the `targets` list.
fn changed_file_path(
    targets: Option<&Vec<Value>>,
    index: usize,
) -> Result<Option<PathBuf>, StoreError> {
    let Some(targets) = targets else {
        return Ok(None);
    };

    for target in targets {
        let pair = target
            .as_list()
            .ok_or(StoreError::InvalidField("targets"))?;
        let target_index = pair
            .first()
            .and_then(|v| v.as_uinteger())
            .ok_or(StoreError::InvalidField("targets"))?;

        if target_index as usize == index {
            let path = pair
                .get(1)
                .and_then(|v| v.as_bytes())
                .ok_or(StoreError::InvalidField("targets"))?;
            return Ok(Some(store_path(path)));
        }
    }

    Ok(None)
}

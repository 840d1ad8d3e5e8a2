use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};

use crate::bencode::{self, Value};
use crate::fsio::FileStreamProvider;
use crate::torrent::{TorrentBox, TorrentInfo};

use super::{
    bool_field, bytes_field, int_field, store_path, uint_field, Intention, StateIterator,
    StateStore, StoreError, TorrentClient,
};

const DATA_DIR_NAME: &str = "uTorrent Web";
const RESUME_FILENAME: &str = "resume.dat";
const STORE_FILENAME: &str = "store.dat";

/// One row of the embedded resume database.
struct ResumeInfo {
    info_hash: String,
    resume_data: Vec<u8>,
    save_path: Option<String>,
}

/// Reads uTorrent Web state: `resume.dat` is an SQLite database whose
/// `TORRENTS` rows each embed a bencoded resume blob carrying the `info`
/// dictionary itself, so no sidecar `.torrent` files are needed.
pub struct UtorrentWebStateStore;

impl StateStore for UtorrentWebStateStore {
    fn client(&self) -> TorrentClient {
        TorrentClient::UtorrentWeb
    }

    #[cfg(windows)]
    fn guess_data_dir(&self, intention: Intention) -> Option<PathBuf> {
        let app_data = std::env::var("APPDATA").ok()?;
        let candidate = PathBuf::from(app_data).join(DATA_DIR_NAME);
        self.is_valid_data_dir(&candidate, intention)
            .then_some(candidate)
    }

    #[cfg(not(windows))]
    fn guess_data_dir(&self, _intention: Intention) -> Option<PathBuf> {
        None
    }

    fn is_valid_data_dir(&self, data_dir: &Path, _intention: Intention) -> bool {
        data_dir.join(RESUME_FILENAME).is_file() && data_dir.join(STORE_FILENAME).is_file()
    }

    fn export<'a>(
        &'a self,
        data_dir: &Path,
        _streams: &'a dyn FileStreamProvider,
    ) -> Result<Box<dyn StateIterator + 'a>, StoreError> {
        debug!("[uTorrentWeb] loading {}", RESUME_FILENAME);

        // The connection stays on this thread; rows are fetched up front
        // and the per-row blob decoding is left to the workers.
        let connection = Connection::open_with_flags(
            data_dir.join(RESUME_FILENAME),
            OpenFlags::SQLITE_OPEN_READ_ONLY,
        )?;

        let mut statement =
            connection.prepare("SELECT INFOHASH, RESUME, SAVE_PATH FROM TORRENTS")?;
        let rows = statement
            .query_map([], |row| {
                Ok(ResumeInfo {
                    info_hash: row.get(0)?,
                    resume_data: row.get(1)?,
                    save_path: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        drop(statement);

        Ok(Box::new(UtorrentWebIterator {
            rows,
            cursor: Mutex::new(0),
        }))
    }

    fn import(
        &self,
        _data_dir: &Path,
        _record: &TorrentBox,
        _streams: &dyn FileStreamProvider,
    ) -> Result<(), StoreError> {
        Err(StoreError::NotImplemented("uTorrent Web import"))
    }
}

struct UtorrentWebIterator {
    rows: Vec<ResumeInfo>,
    cursor: Mutex<usize>,
}

impl StateIterator for UtorrentWebIterator {
    fn next(&self) -> Result<Option<TorrentBox>, StoreError> {
        let row = {
            let mut cursor = self.cursor.lock();
            match self.rows.get(*cursor) {
                None => return Ok(None),
                Some(row) => {
                    *cursor += 1;
                    row
                }
            }
        };

        let resume = bencode::decode(&row.resume_data)?;

        let torrent = synthetic_torrent(&resume)?;

        let save_root = match resume.get(b"save_path").and_then(|v| v.as_bytes()) {
            Some(path) => store_path(path),
            None => {
                let column = row
                    .save_path
                    .as_deref()
                    .ok_or(StoreError::MissingField("save_path"))?;
                store_path(column.as_bytes())
            }
        };

        let mut record = TorrentBox::new(torrent);
        record.added_at = int_field(&resume, "added_time")?;
        record.completed_at = int_field(&resume, "completed_time")?;
        record.is_paused = bool_field(&resume, "paused")?;
        record.downloaded_size = uint_field(&resume, "total_downloaded")?;
        record.uploaded_size = uint_field(&resume, "total_uploaded")?;
        record.corrupted_size = 0;
        record.save_path = save_root.join(crate::fsio::bytes_to_path(record.torrent.name()?));
        record.block_size = record.torrent.piece_size()?;

        let pieces = bytes_field(&resume, "pieces")?;
        record.valid_blocks = pieces.iter().map(|&byte| byte != 0).collect();
        record
            .valid_blocks
            .resize(record.torrent.piece_count()? as usize, false);

        if let Some(tiers) = resume.get(b"trackers").and_then(|v| v.as_list()) {
            for tier in tiers {
                let urls = tier
                    .as_list()
                    .ok_or(StoreError::InvalidField("trackers"))?;
                let mut out = Vec::with_capacity(urls.len());
                for url in urls {
                    out.push(
                        url.as_str()
                            .ok_or(StoreError::InvalidField("trackers"))?
                            .to_owned(),
                    );
                }
                record.trackers.push(out);
            }
        }

        if !record.torrent.info_hash().eq_hex_ignore_case(&row.info_hash) {
            warn!(
                "resume row {} holds info dictionary hashing to {}",
                row.info_hash,
                record.torrent.info_hash()
            );
        }

        Ok(Some(record))
    }
}

/// Builds a `.torrent` document from the `info` dictionary (and
/// `url-list`) embedded in the resume blob.
fn synthetic_torrent(resume: &Value) -> Result<TorrentInfo, StoreError> {
    let info = resume
        .get(b"info")
        .ok_or(StoreError::MissingField("info"))?
        .clone();
    let url_list = resume
        .get(b"url-list")
        .cloned()
        .unwrap_or(Value::List(Vec::new()));

    let mut root = BTreeMap::new();
    root.insert(Bytes::from_static(b"info"), info);
    root.insert(Bytes::from_static(b"url-list"), url_list);

    Ok(TorrentInfo::from_value(Value::Dict(root))?)
}

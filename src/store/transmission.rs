use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::bencode::Value;
use crate::fsio::FileStreamProvider;
use crate::plist::{self, TransferEntry};
use crate::torrent::{priority_to_store, LimitMode, TorrentBox};

use super::{Intention, StateIterator, StateStore, StoreError, TorrentClient};

const COMMON_DATA_DIR_NAME: &str = "transmission";
const DAEMON_DATA_DIR_NAME: &str = "transmission-daemon";
const MAC_DATA_DIR: &str = "Library/Application Support/Transmission";
const TRANSFERS_FILENAME: &str = "Transfers.plist";

const MIN_PRIORITY: i32 = -1;
const MAX_PRIORITY: i32 = 1;

/// Transmission's internal sub-block unit; piece sizes must be a
/// positive multiple of this.
const SUB_BLOCK_SIZE: u32 = 16 * 1024;

/// Emits `<caption>.<hash prefix>` base names as Transmission 2.9x
/// expects instead of the plain info hash.
const COMPAT_29X_ENV: &str = "TRANSMISSION_29X_COMPAT";
/// Additionally emits the experimental `files` resume key.
const FILES_KEY_ENV: &str = "TRANSMISSION_FILES_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmissionVariant {
    Generic,
    Mac,
}

/// Writes Transmission state: one `.torrent` plus one `.resume` file per
/// torrent, and on the Mac variant an entry in `Transfers.plist`.
pub struct TransmissionStateStore {
    variant: TransmissionVariant,
    compat_29x: bool,
    emit_files_key: bool,
    transfers_lock: Mutex<()>,
}

impl TransmissionStateStore {
    pub fn new(variant: TransmissionVariant) -> Self {
        Self {
            variant,
            compat_29x: std::env::var_os(COMPAT_29X_ENV).is_some(),
            emit_files_key: std::env::var_os(FILES_KEY_ENV).is_some(),
            transfers_lock: Mutex::new(()),
        }
    }

    fn resume_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(match self.variant {
            TransmissionVariant::Generic => "resume",
            TransmissionVariant::Mac => "Resume",
        })
    }

    fn torrents_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(match self.variant {
            TransmissionVariant::Generic => "torrents",
            TransmissionVariant::Mac => "Torrents",
        })
    }

    fn base_name(&self, record: &TorrentBox) -> String {
        let hash = record.torrent.info_hash().to_hex();
        if !self.compat_29x {
            return hash;
        }

        let caption = if record.caption.is_empty() {
            record.torrent.name_string().unwrap_or_default()
        } else {
            String::from_utf8_lossy(&record.caption).into_owned()
        };
        format!("{}.{}", caption, &hash[..16])
    }

    /// Appends this torrent to `Transfers.plist`, reading any staged
    /// content back through the provider so concurrent imports
    /// accumulate. The read-modify-write runs under a dedicated lock.
    fn append_transfer(
        &self,
        data_dir: &Path,
        record: &TorrentBox,
        torrent_path: &Path,
        streams: &dyn FileStreamProvider,
    ) -> Result<(), StoreError> {
        let transfers_path = data_dir.join(TRANSFERS_FILENAME);

        let _guard = self.transfers_lock.lock();

        let existing = streams
            .read_stream(&transfers_path)
            .ok()
            .and_then(|mut stream| {
                let mut raw = Vec::new();
                stream.read_to_end(&mut raw).ok()?;
                String::from_utf8(raw).ok()
            });

        let entry = TransferEntry {
            active: !record.is_paused,
            internal_torrent_path: torrent_path.to_string_lossy().into_owned(),
            torrent_hash: record.torrent.info_hash().to_hex(),
        };
        let document = plist::append_entry(existing.as_deref(), &entry);

        let mut stream = streams.write_stream(&transfers_path)?;
        std::io::Write::write_all(&mut stream, document.as_bytes())
            .map_err(|e| crate::fsio::IoFailure::new(&transfers_path, e))?;

        Ok(())
    }
}

impl StateStore for TransmissionStateStore {
    fn client(&self) -> TorrentClient {
        match self.variant {
            TransmissionVariant::Generic => TorrentClient::Transmission,
            TransmissionVariant::Mac => TorrentClient::TransmissionMac,
        }
    }

    fn guess_data_dir(&self, intention: Intention) -> Option<PathBuf> {
        match self.variant {
            TransmissionVariant::Generic => {
                let config_home = super::config_home()?;
                for name in [COMMON_DATA_DIR_NAME, DAEMON_DATA_DIR_NAME] {
                    let candidate = config_home.join(name);
                    if self.is_valid_data_dir(&candidate, intention) {
                        return Some(candidate);
                    }
                }
                None
            }
            TransmissionVariant::Mac => {
                let candidate = super::home_dir()?.join(MAC_DATA_DIR);
                self.is_valid_data_dir(&candidate, intention)
                    .then_some(candidate)
            }
        }
    }

    fn is_valid_data_dir(&self, data_dir: &Path, _intention: Intention) -> bool {
        self.resume_dir(data_dir).is_dir() && self.torrents_dir(data_dir).is_dir()
    }

    fn export<'a>(
        &'a self,
        _data_dir: &Path,
        _streams: &'a dyn FileStreamProvider,
    ) -> Result<Box<dyn StateIterator + 'a>, StoreError> {
        Err(StoreError::NotImplemented("Transmission export"))
    }

    fn import(
        &self,
        data_dir: &Path,
        record: &TorrentBox,
        streams: &dyn FileStreamProvider,
    ) -> Result<(), StoreError> {
        if record.block_size == 0 || record.block_size % SUB_BLOCK_SIZE != 0 {
            return Err(StoreError::ImportCancelled(format!(
                "Transmission does not support torrents with piece length not multiple of 16 KiB: {}",
                record.block_size
            )));
        }

        for file in &record.files {
            if let Some(path) = &file.path {
                if !path.is_relative() {
                    return Err(StoreError::ImportCancelled(format!(
                        "Transmission does not support moving files outside of the download directory: \"{}\"",
                        path.display()
                    )));
                }
            }
        }

        let resume = self.build_resume(record)?;

        let base_name = self.base_name(record);
        let torrent_path = self
            .torrents_dir(data_dir)
            .join(format!("{}.torrent", base_name));
        let resume_path = self
            .resume_dir(data_dir)
            .join(format!("{}.resume", base_name));

        // Trackers travel in the outgoing torrent document.
        let mut torrent = record.torrent.clone();
        torrent.set_trackers(&record.trackers)?;

        {
            let mut stream = streams.write_stream(&torrent_path)?;
            torrent.encode_to(&mut stream)?;
        }

        {
            let mut stream = streams.write_stream(&resume_path)?;
            crate::bencode::encode_to(&resume, &mut stream)?;
        }

        if self.variant == TransmissionVariant::Mac {
            self.append_transfer(data_dir, record, &torrent_path, streams)?;
        }

        Ok(())
    }
}

impl TransmissionStateStore {
    fn build_resume(&self, record: &TorrentBox) -> Result<Value, StoreError> {
        let mut resume = BTreeMap::new();

        resume.insert(
            Bytes::from_static(b"added-date"),
            Value::Integer(record.added_at),
        );
        resume.insert(
            Bytes::from_static(b"done-date"),
            Value::Integer(record.completed_at),
        );
        resume.insert(
            Bytes::from_static(b"corrupt"),
            Value::Uint(record.corrupted_size),
        );
        resume.insert(
            Bytes::from_static(b"downloaded"),
            Value::Uint(record.downloaded_size),
        );
        resume.insert(
            Bytes::from_static(b"uploaded"),
            Value::Uint(record.uploaded_size),
        );

        let destination = record.save_path.parent().unwrap_or(Path::new(""));
        resume.insert(
            Bytes::from_static(b"destination"),
            path_value(destination),
        );
        let name = record.save_path.file_name().unwrap_or_default();
        resume.insert(
            Bytes::from_static(b"name"),
            Value::Bytes(Bytes::copy_from_slice(name.as_encoded_bytes())),
        );

        resume.insert(
            Bytes::from_static(b"paused"),
            Value::Integer(i64::from(record.is_paused)),
        );

        resume.insert(
            Bytes::from_static(b"dnd"),
            Value::List(
                record
                    .files
                    .iter()
                    .map(|f| Value::Integer(i64::from(f.do_not_download)))
                    .collect(),
            ),
        );
        resume.insert(
            Bytes::from_static(b"priority"),
            Value::List(
                record
                    .files
                    .iter()
                    .map(|f| {
                        Value::Integer(i64::from(priority_to_store(
                            f.priority,
                            MIN_PRIORITY,
                            MAX_PRIORITY,
                        )))
                    })
                    .collect(),
            ),
        );

        resume.insert(
            Bytes::from_static(b"progress"),
            build_progress(
                &record.valid_blocks,
                record.block_size,
                record.torrent.total_size()?,
                record.files.len(),
            ),
        );

        resume.insert(
            Bytes::from_static(b"ratio-limit"),
            ratio_limit_value(record),
        );
        resume.insert(
            Bytes::from_static(b"speed-limit-down"),
            speed_limit_value(&record.download_speed_limit),
        );
        resume.insert(
            Bytes::from_static(b"speed-limit-up"),
            speed_limit_value(&record.upload_speed_limit),
        );

        if self.emit_files_key {
            let mut files = Vec::with_capacity(record.files.len());
            for (index, file) in record.files.iter().enumerate() {
                let in_torrent = match &file.path {
                    Some(path) => path.clone(),
                    None => record.torrent.file_path(index)?,
                };
                files.push(path_value(&record.save_path.join(in_torrent)));
            }
            resume.insert(Bytes::from_static(b"files"), Value::List(files));
        }

        Ok(Value::Dict(resume))
    }
}

fn path_value(path: &Path) -> Value {
    Value::Bytes(Bytes::copy_from_slice(path.as_os_str().as_encoded_bytes()))
}

/// Builds the `progress` map: `"all"`/`"none"` shortcuts, or a packed
/// sub-block bit string where every piece expands to
/// `block_size / 16 KiB` bits, MSB-first within each byte.
fn build_progress(
    valid_blocks: &[bool],
    block_size: u32,
    total_size: u64,
    file_count: usize,
) -> Value {
    let mut progress = BTreeMap::new();

    let valid_count = valid_blocks.iter().filter(|b| **b).count();

    if valid_count == valid_blocks.len() {
        progress.insert(Bytes::from_static(b"blocks"), Value::string("all"));
        progress.insert(Bytes::from_static(b"have"), Value::string("all"));
    } else if valid_count == 0 {
        progress.insert(Bytes::from_static(b"blocks"), Value::string("none"));
    } else {
        let sub_blocks_per_piece = block_size / SUB_BLOCK_SIZE;

        let mut packed = Vec::with_capacity(
            (valid_blocks.len() * sub_blocks_per_piece as usize).div_ceil(8),
        );
        let mut pack = 0u8;
        let mut shift = 7i8;
        for &valid in valid_blocks {
            for _ in 0..sub_blocks_per_piece {
                pack |= u8::from(valid) << shift;
                shift -= 1;
                if shift < 0 {
                    packed.push(pack);
                    pack = 0;
                    shift = 7;
                }
            }
        }
        if shift < 7 {
            packed.push(pack);
        }

        // Trim (or pad) to the byte count covering the real sub-block
        // total; the last piece is usually short.
        let sub_block_count = total_size.div_ceil(u64::from(SUB_BLOCK_SIZE));
        packed.resize(sub_block_count.div_ceil(8) as usize, 0);

        progress.insert(
            Bytes::from_static(b"blocks"),
            Value::Bytes(Bytes::from(packed)),
        );
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    progress.insert(
        Bytes::from_static(b"time-checked"),
        Value::List(vec![Value::Integer(now); file_count]),
    );

    Value::Dict(progress)
}

fn ratio_limit_value(record: &TorrentBox) -> Value {
    let mut map = BTreeMap::new();
    map.insert(
        Bytes::from_static(b"ratio-mode"),
        Value::Integer(match record.ratio_limit.mode {
            LimitMode::Inherit => 0,
            LimitMode::Enabled => 1,
            LimitMode::Disabled => 2,
        }),
    );
    map.insert(
        Bytes::from_static(b"ratio-limit"),
        Value::string(&format!("{:.6}", record.ratio_limit.value)),
    );
    Value::Dict(map)
}

fn speed_limit_value(limit: &crate::torrent::LimitInfo) -> Value {
    let mut map = BTreeMap::new();
    map.insert(
        Bytes::from_static(b"speed-Bps"),
        Value::Integer(limit.value as i64),
    );
    map.insert(
        Bytes::from_static(b"use-global-speed-limit"),
        Value::Integer(i64::from(limit.mode != LimitMode::Disabled)),
    );
    map.insert(
        Bytes::from_static(b"use-speed-limit"),
        Value::Integer(i64::from(limit.mode == LimitMode::Enabled)),
    );
    Value::Dict(map)
}

use std::path::PathBuf;

use bytes::Bytes;

use super::info::TorrentInfo;

/// Lowest file priority on the canonical scale.
pub const MIN_PRIORITY: i32 = -20;
/// Neutral file priority.
pub const NORMAL_PRIORITY: i32 = 0;
/// Highest file priority on the canonical scale.
pub const MAX_PRIORITY: i32 = 20;

/// Whether a limit applies, is explicitly off, or defers to the client's
/// global setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitMode {
    #[default]
    Inherit,
    Enabled,
    Disabled,
}

/// A ratio or speed limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct LimitInfo {
    pub mode: LimitMode,
    pub value: f64,
}

/// Per-file state within a [`TorrentBox`].
#[derive(Debug, Clone, Default)]
pub struct FileInfo {
    pub do_not_download: bool,
    /// Priority on the canonical `[-20, 20]` scale; 0 when
    /// `do_not_download` is set.
    pub priority: i32,
    /// Relocated path relative to the download root, when the client
    /// moved the file away from its in-torrent location.
    pub path: Option<PathBuf>,
}

/// The canonical per-torrent state record.
///
/// Produced by one client's reader, consumed by another client's writer;
/// owned end-to-end by a single worker.
#[derive(Debug, Clone)]
pub struct TorrentBox {
    pub torrent: TorrentInfo,
    /// Seconds since the epoch.
    pub added_at: i64,
    pub completed_at: i64,
    pub is_paused: bool,
    pub downloaded_size: u64,
    pub uploaded_size: u64,
    pub corrupted_size: u64,
    /// Path to the torrent's root on disk, including the torrent name.
    pub save_path: PathBuf,
    /// Piece size; one entry of `valid_blocks` covers this many bytes.
    pub block_size: u32,
    pub ratio_limit: LimitInfo,
    pub download_speed_limit: LimitInfo,
    pub upload_speed_limit: LimitInfo,
    pub files: Vec<FileInfo>,
    /// One flag per piece, `ceil(total_size / block_size)` entries.
    pub valid_blocks: Vec<bool>,
    /// Tracker tiers, outermost list ordered by preference.
    pub trackers: Vec<Vec<String>>,
    /// Free-form label some clients attach; empty when absent.
    pub caption: Bytes,
}

impl TorrentBox {
    pub fn new(torrent: TorrentInfo) -> Self {
        Self {
            torrent,
            added_at: 0,
            completed_at: 0,
            is_paused: false,
            downloaded_size: 0,
            uploaded_size: 0,
            corrupted_size: 0,
            save_path: PathBuf::new(),
            block_size: 0,
            ratio_limit: LimitInfo::default(),
            download_speed_limit: LimitInfo::default(),
            upload_speed_limit: LimitInfo::default(),
            files: Vec::new(),
            valid_blocks: Vec::new(),
            trackers: Vec::new(),
            caption: Bytes::new(),
        }
    }
}

/// Maps a client's stored priority onto the canonical `[-20, 20]` scale.
///
/// The store scale's midpoint maps to 0 and its endpoints to the
/// canonical endpoints, linearly in between.
pub fn priority_from_store(store_value: i32, store_min: i32, store_max: i32) -> i32 {
    let store_scale = f64::from(store_max - store_min);
    let box_scale = f64::from(MAX_PRIORITY - MIN_PRIORITY);
    let store_middle = f64::from(store_min) + store_scale / 2.0;
    ((f64::from(store_value) - store_middle) * box_scale / store_scale).round() as i32
}

/// Maps a canonical priority onto a client's stored scale.
///
/// Priority 0 lands on the integer median of `[store_min, store_max]`;
/// the canonical endpoints land on the store endpoints.
pub fn priority_to_store(box_value: i32, store_min: i32, store_max: i32) -> i32 {
    let store_scale = f64::from(store_max - store_min);
    let box_scale = f64::from(MAX_PRIORITY - MIN_PRIORITY);
    let store_middle = f64::from(store_min + store_max) / 2.0;
    (store_middle + f64::from(box_value) * store_scale / box_scale).round() as i32
}

//! Torrent metadata and the canonical migration record
//!
//! [`TorrentInfo`] wraps a parsed `.torrent` document and exposes the
//! handful of derived attributes the migration needs (info hash, name,
//! piece size, total size, per-file paths). [`TorrentBox`] is the
//! client-neutral per-torrent state record every reader produces and
//! every writer consumes.

mod error;
mod info;
mod info_hash;
mod record;

pub use error::TorrentError;
pub use info::TorrentInfo;
pub use info_hash::InfoHash;
pub use record::{
    priority_from_store, priority_to_store, FileInfo, LimitInfo, LimitMode, TorrentBox,
    MAX_PRIORITY, MIN_PRIORITY, NORMAL_PRIORITY,
};

//! torport - migrates per-torrent resume state between BitTorrent clients
//!
//! Reads one client's persisted state directory, normalizes every torrent
//! into a uniform in-memory record, and re-serializes each into the
//! target client's on-disk format, preserving completion bitmaps,
//! priorities, limits, trackers, and metadata.
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 bencode codec over a dynamic value tree
//! - [`pickle`] - Python pickle decoder (Deluge state)
//! - [`torrent`] - torrent metadata and the canonical state record
//! - [`store`] - per-client readers and writers plus the factory
//! - [`transaction`] - staged, crash-safe target writes
//! - [`migrate`] - the parallel worker pool
//! - [`fsio`] - file-stream provider abstraction
//! - [`plist`] - Transfers.plist editing for Transmission on macOS
//! - [`signal`] - cooperative interruption flag

pub mod bencode;
pub mod fsio;
pub mod migrate;
pub mod pickle;
pub mod plist;
pub mod signal;
pub mod store;
pub mod torrent;
pub mod transaction;

pub use bencode::{decode, encode, BencodeError, Value};
pub use fsio::{FileStreamProvider, IoFailure, PlainFileStreamProvider};
pub use migrate::{run_import, MigrateResult};
pub use pickle::PickleError;
pub use signal::InterruptFlag;
pub use store::{
    DebugStateIterator, Intention, StateIterator, StateStore, StoreError, TorrentClient,
};
pub use torrent::{InfoHash, TorrentBox, TorrentError, TorrentInfo};
pub use transaction::{MigrationTransaction, TransactionMode};

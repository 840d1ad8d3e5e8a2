//! Per-client state stores
//!
//! One [`StateStore`] implementation per supported client. A store can
//! probe and guess data directories, export its on-disk state as a lazy
//! sequence of [`TorrentBox`] values, and (for target clients) import a
//! box by writing the client's file set. The factory maps the
//! [`TorrentClient`] enum to implementations and can guess the client
//! from a data directory alone.

mod client;
mod debug;
mod deluge;
mod error;
mod rtorrent;
mod transmission;
mod utorrent;
mod utorrent_web;

pub use client::{Intention, TorrentClient};
pub use debug::DebugStateIterator;
pub use deluge::DelugeStateStore;
pub use error::StoreError;
pub use rtorrent::RtorrentStateStore;
pub use transmission::{TransmissionStateStore, TransmissionVariant};
pub use utorrent::UtorrentStateStore;
pub use utorrent_web::UtorrentWebStateStore;

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::bencode::Value;
use crate::fsio::{bytes_to_path, FileStreamProvider};
use crate::torrent::TorrentBox;


/// A lazy, thread-safe sequence of torrent state records.
///
/// Pulling an item serializes only the cursor advance; the expensive
/// per-item work (auxiliary file reads, embedded blob decoding) runs
/// outside the critical section, so workers can share one iterator.
pub trait StateIterator: Send + Sync {
    /// Returns the next record, `None` when exhausted, or a per-torrent
    /// error that leaves the iterator usable for the following item.
    fn next(&self) -> Result<Option<TorrentBox>, StoreError>;
}

/// The per-client capability set.
pub trait StateStore: Send + Sync {
    fn client(&self) -> TorrentClient;

    /// Guesses the client's default data directory, if one exists and
    /// probes as valid.
    fn guess_data_dir(&self, intention: Intention) -> Option<PathBuf>;

    fn is_valid_data_dir(&self, data_dir: &Path, intention: Intention) -> bool;

    /// Opens the source state and returns an iterator over its torrents.
    fn export<'a>(
        &'a self,
        data_dir: &Path,
        streams: &'a dyn FileStreamProvider,
    ) -> Result<Box<dyn StateIterator + 'a>, StoreError>;

    /// Writes one torrent's state into the target data directory.
    fn import(
        &self,
        data_dir: &Path,
        record: &TorrentBox,
        streams: &dyn FileStreamProvider,
    ) -> Result<(), StoreError>;
}

/// Constructs the store implementation for a client.
pub fn create(client: TorrentClient) -> Box<dyn StateStore> {
    match client {
        TorrentClient::Deluge => Box::new(DelugeStateStore),
        TorrentClient::Rtorrent => Box::new(RtorrentStateStore),
        TorrentClient::Transmission => {
            Box::new(TransmissionStateStore::new(TransmissionVariant::Generic))
        }
        TorrentClient::TransmissionMac => {
            Box::new(TransmissionStateStore::new(TransmissionVariant::Mac))
        }
        TorrentClient::Utorrent => Box::new(UtorrentStateStore),
        TorrentClient::UtorrentWeb => Box::new(UtorrentWebStateStore),
    }
}

/// Probes a data directory against every client; exactly one must claim
/// it.
pub fn guess_by_data_dir(
    data_dir: &Path,
    intention: Intention,
) -> Result<Box<dyn StateStore>, StoreError> {
    let mut matched: Option<Box<dyn StateStore>> = None;

    for client in TorrentClient::ALL {
        let store = create(client);
        if store.is_valid_data_dir(data_dir, intention) {
            if matched.is_some() {
                return Err(StoreError::AmbiguousDataDir(data_dir.to_owned()));
            }
            matched = Some(store);
        }
    }

    matched.ok_or_else(|| StoreError::NoClientMatched(data_dir.to_owned()))
}

// Field access helpers shared by the readers. Source schemas are loosely
// typed, so every lookup states the field name in its error.

pub(crate) fn field<'a>(dict: &'a Value, key: &'static str) -> Result<&'a Value, StoreError> {
    dict.get(key.as_bytes())
        .ok_or(StoreError::MissingField(key))
}

pub(crate) fn int_field(dict: &Value, key: &'static str) -> Result<i64, StoreError> {
    field(dict, key)?
        .as_integer()
        .ok_or(StoreError::InvalidField(key))
}

pub(crate) fn uint_field(dict: &Value, key: &'static str) -> Result<u64, StoreError> {
    field(dict, key)?
        .as_uinteger()
        .ok_or(StoreError::InvalidField(key))
}

pub(crate) fn float_field(dict: &Value, key: &'static str) -> Result<f64, StoreError> {
    field(dict, key)?
        .as_float()
        .ok_or(StoreError::InvalidField(key))
}

pub(crate) fn bool_field(dict: &Value, key: &'static str) -> Result<bool, StoreError> {
    field(dict, key)?
        .as_bool()
        .ok_or(StoreError::InvalidField(key))
}

pub(crate) fn bytes_field<'a>(
    dict: &'a Value,
    key: &'static str,
) -> Result<&'a Bytes, StoreError> {
    field(dict, key)?
        .as_bytes()
        .ok_or(StoreError::InvalidField(key))
}

pub(crate) fn str_field<'a>(dict: &'a Value, key: &'static str) -> Result<&'a str, StoreError> {
    field(dict, key)?
        .as_str()
        .ok_or(StoreError::InvalidField(key))
}

pub(crate) fn list_field<'a>(
    dict: &'a Value,
    key: &'static str,
) -> Result<&'a Vec<Value>, StoreError> {
    field(dict, key)?
        .as_list()
        .ok_or(StoreError::InvalidField(key))
}

/// Converts a stored native path to a `PathBuf`, normalizing Windows
/// drive-letter paths to forward slashes.
pub(crate) fn store_path(raw: &[u8]) -> PathBuf {
    let fixed: Cow<[u8]> = if raw.len() >= 3
        && raw[0].is_ascii_alphabetic()
        && raw[1] == b':'
        && (raw[2] == b'/' || raw[2] == b'\\')
    {
        Cow::Owned(
            raw.iter()
                .map(|&b| if b == b'\\' { b'/' } else { b })
                .collect(),
        )
    } else {
        Cow::Borrowed(raw)
    };

    bytes_to_path(&fixed)
}

/// `$XDG_CONFIG_HOME`, falling back to `$HOME/.config`.
pub(crate) fn config_home() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Some(PathBuf::from(xdg));
        }
    }
    home_dir().map(|home| home.join(".config"))
}

pub(crate) fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

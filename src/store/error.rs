use std::path::PathBuf;

use thiserror::Error;

use crate::bencode::BencodeError;
use crate::fsio::IoFailure;
use crate::pickle::PickleError;
use crate::torrent::TorrentError;

/// Errors surfaced by readers, writers, and the factory.
///
/// [`StoreError::ImportCancelled`] is special: the target client refused
/// one specific torrent, which the worker loop counts as a skip rather
/// than a failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Bencode(#[from] BencodeError),

    #[error(transparent)]
    Pickle(#[from] PickleError),

    #[error(transparent)]
    Torrent(#[from] TorrentError),

    #[error(transparent)]
    Io(#[from] IoFailure),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    #[error("import cancelled: {0}")]
    ImportCancelled(String),

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("unknown torrent client: {0:?}")]
    UnknownClient(String),

    #[error("no torrent client matched data directory \"{}\"", .0.display())]
    NoClientMatched(PathBuf),

    #[error("more than one torrent client matched data directory \"{}\"", .0.display())]
    AmbiguousDataDir(PathBuf),
}

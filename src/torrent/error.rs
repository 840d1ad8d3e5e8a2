use crate::bencode::BencodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TorrentError {
    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    #[error("invalid info hash")]
    InvalidInfoHash,

    #[error("info hashes don't match: {actual} vs. {expected}")]
    InfoHashMismatch { expected: String, actual: String },

    #[error("torrent file #{0} does not exist")]
    FileOutOfRange(usize),
}

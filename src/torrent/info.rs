use std::io::{Read, Write};
use std::path::PathBuf;

use bytes::Bytes;

use crate::bencode::{self, Value};
use crate::fsio::bytes_to_path;

use super::error::TorrentError;
use super::info_hash::InfoHash;

/// A parsed `.torrent` document.
///
/// Owns the decoded value tree and the info hash computed from it at
/// construction. Byte strings in the tree are kept as raw bytes, so
/// re-encoding reproduces the source document (and therefore the info
/// hash) exactly; derived accessors decode to UTF-8 only at the edges.
#[derive(Debug, Clone)]
pub struct TorrentInfo {
    root: Value,
    info_hash: InfoHash,
}

impl TorrentInfo {
    /// Wraps a decoded torrent document, computing its info hash.
    ///
    /// # Errors
    ///
    /// Fails if the document is not a dictionary or lacks an `info`
    /// dictionary.
    pub fn from_value(root: Value) -> Result<Self, TorrentError> {
        let info = root
            .get(b"info")
            .ok_or(TorrentError::MissingField("info"))?;
        let encoded = bencode::encode(info)?;
        let info_hash = InfoHash::from_info_bytes(&encoded);
        Ok(Self { root, info_hash })
    }

    /// Parses a torrent document from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TorrentError> {
        Self::from_value(bencode::decode(data)?)
    }

    /// Parses a torrent document from a byte stream.
    pub fn decode_from<R: Read>(reader: R) -> Result<Self, TorrentError> {
        Self::from_value(bencode::decode_from(reader)?)
    }

    /// Re-encodes the document as bencode.
    pub fn encode(&self) -> Result<Vec<u8>, TorrentError> {
        Ok(bencode::encode(&self.root)?)
    }

    /// Re-encodes the document into a byte sink.
    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<(), TorrentError> {
        Ok(bencode::encode_to(&self.root, writer)?)
    }

    /// The SHA1 of the bencoded `info` dictionary.
    pub fn info_hash(&self) -> &InfoHash {
        &self.info_hash
    }

    fn info(&self) -> Result<&Value, TorrentError> {
        self.root
            .get(b"info")
            .ok_or(TorrentError::MissingField("info"))
    }

    /// The torrent name as raw bytes.
    ///
    /// Nominally UTF-8, arbitrary bytes in practice.
    pub fn name(&self) -> Result<&Bytes, TorrentError> {
        self.info()?
            .get(b"name")
            .and_then(|v| v.as_bytes())
            .ok_or(TorrentError::MissingField("name"))
    }

    /// The torrent name decoded as UTF-8, lossily.
    pub fn name_string(&self) -> Result<String, TorrentError> {
        Ok(String::from_utf8_lossy(self.name()?).into_owned())
    }

    /// The piece size in bytes.
    pub fn piece_size(&self) -> Result<u32, TorrentError> {
        let raw = self
            .info()?
            .get(b"piece length")
            .and_then(|v| v.as_uinteger())
            .ok_or(TorrentError::MissingField("piece length"))?;
        u32::try_from(raw).map_err(|_| TorrentError::InvalidField("piece length"))
    }

    /// The total payload size in bytes: `info.length` for single-file
    /// torrents, the sum of `info.files[].length` otherwise.
    pub fn total_size(&self) -> Result<u64, TorrentError> {
        let info = self.info()?;

        match info.get(b"files").and_then(|v| v.as_list()) {
            None => info
                .get(b"length")
                .and_then(|v| v.as_uinteger())
                .ok_or(TorrentError::MissingField("length")),
            Some(files) => {
                let mut total = 0u64;
                for file in files {
                    total += file
                        .get(b"length")
                        .and_then(|v| v.as_uinteger())
                        .ok_or(TorrentError::MissingField("length"))?;
                }
                Ok(total)
            }
        }
    }

    /// The number of payload files.
    pub fn file_count(&self) -> Result<usize, TorrentError> {
        match self.info()?.get(b"files").and_then(|v| v.as_list()) {
            None => Ok(1),
            Some(files) => Ok(files.len()),
        }
    }

    /// The number of pieces, `ceil(total_size / piece_size)`.
    pub fn piece_count(&self) -> Result<u64, TorrentError> {
        let piece_size = u64::from(self.piece_size()?);
        if piece_size == 0 {
            return Err(TorrentError::InvalidField("piece length"));
        }
        Ok(self.total_size()?.div_ceil(piece_size))
    }

    /// The in-torrent path of file `index`: the name for single-file
    /// torrents, the joined `path` components otherwise.
    pub fn file_path(&self, index: usize) -> Result<PathBuf, TorrentError> {
        let info = self.info()?;

        match info.get(b"files").and_then(|v| v.as_list()) {
            None => {
                if index != 0 {
                    return Err(TorrentError::FileOutOfRange(index));
                }
                Ok(bytes_to_path(self.name()?))
            }
            Some(files) => {
                let file = files.get(index).ok_or(TorrentError::FileOutOfRange(index))?;
                let parts = file
                    .get(b"path")
                    .and_then(|v| v.as_list())
                    .ok_or(TorrentError::MissingField("path"))?;

                let mut path = PathBuf::new();
                for part in parts {
                    let bytes = part
                        .as_bytes()
                        .ok_or(TorrentError::InvalidField("path"))?;
                    path.push(bytes_to_path(bytes));
                }
                Ok(path)
            }
        }
    }

    /// Replaces `announce-list` (and `announce`) with the given tracker
    /// tiers. The document stays canonically ordered for re-encoding.
    pub fn set_trackers(&mut self, tiers: &[Vec<String>]) -> Result<(), TorrentError> {
        let dict = self
            .root
            .as_dict_mut()
            .ok_or(TorrentError::InvalidField("root"))?;

        let announce_list = Value::List(
            tiers
                .iter()
                .map(|tier| {
                    Value::List(tier.iter().map(|url| Value::from(url.as_str())).collect())
                })
                .collect(),
        );
        dict.insert(Bytes::from_static(b"announce-list"), announce_list);

        match tiers.iter().flatten().next() {
            Some(url) => {
                dict.insert(Bytes::from_static(b"announce"), Value::from(url.as_str()));
            }
            None => {
                dict.remove(b"announce".as_slice());
            }
        }

        Ok(())
    }
}

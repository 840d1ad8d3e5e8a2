use super::error::TorrentError;
use std::fmt;

/// A BitTorrent v1 info hash (20-byte SHA1).
///
/// The canonical torrent identifier: the SHA1 of the bencoded `info`
/// dictionary, conventionally rendered as 40 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates an info hash from raw bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Creates an info hash by hashing bencoded info dictionary bytes.
    pub fn from_info_bytes(info_bytes: &[u8]) -> Self {
        use sha1::{Digest, Sha1};
        let mut hasher = Sha1::new();
        hasher.update(info_bytes);
        let hash: [u8; 20] = hasher.finalize().into();
        Self(hash)
    }

    /// Parses an info hash from a 40-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TorrentError> {
        if s.len() != 40 {
            return Err(TorrentError::InvalidInfoHash);
        }
        let bytes = hex_decode(s).ok_or(TorrentError::InvalidInfoHash)?;
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Returns the raw bytes of the info hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Converts to a lowercase hexadecimal string.
    ///
    /// # Examples
    ///
    /// ```
    /// use torport::torrent::InfoHash;
    ///
    /// let hash = InfoHash::from_bytes([0xab; 20]);
    /// assert_eq!(hash.to_hex(), "abababababababababababababababababababab");
    /// ```
    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }

    /// Compares against a hex string, exact case.
    pub fn eq_hex(&self, s: &str) -> bool {
        self.to_hex() == s
    }

    /// Compares against a hex string, ignoring ASCII case.
    pub fn eq_hex_ignore_case(&self, s: &str) -> bool {
        self.to_hex().eq_ignore_ascii_case(s)
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
            s
        })
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

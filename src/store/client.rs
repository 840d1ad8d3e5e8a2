use std::fmt;
use std::str::FromStr;

use super::error::StoreError;

/// Whether a data directory is being read from or written to. Some
/// validity probes differ: an import target only needs to be a
/// directory, an export source must hold actual state files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intention {
    Export,
    Import,
}

/// The supported torrent clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorrentClient {
    Deluge,
    Rtorrent,
    Transmission,
    TransmissionMac,
    Utorrent,
    UtorrentWeb,
}

impl TorrentClient {
    pub const ALL: [TorrentClient; 6] = [
        TorrentClient::Deluge,
        TorrentClient::Rtorrent,
        TorrentClient::Transmission,
        TorrentClient::TransmissionMac,
        TorrentClient::Utorrent,
        TorrentClient::UtorrentWeb,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TorrentClient::Deluge => "Deluge",
            TorrentClient::Rtorrent => "rTorrent",
            TorrentClient::Transmission => "Transmission",
            TorrentClient::TransmissionMac => "TransmissionMac",
            TorrentClient::Utorrent => "uTorrent",
            TorrentClient::UtorrentWeb => "uTorrentWeb",
        }
    }
}

impl fmt::Display for TorrentClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TorrentClient {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TorrentClient::ALL
            .into_iter()
            .find(|client| client.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| StoreError::UnknownClient(s.to_owned()))
    }
}

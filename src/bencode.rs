//! Bencode encoding and decoding (BEP-3)
//!
//! Bencode is the encoding used by BitTorrent for storing and transmitting
//! loosely structured data. It appears in `.torrent` files, resume files,
//! and byte strings embedded inside other bencoded documents.
//!
//! The [`Value`] tree produced here is also the target representation of
//! the [`crate::pickle`] decoder, so it carries a few variants (null,
//! bool, float) that bencode itself cannot express. Encoding such a value
//! fails with [`BencodeError::Unrepresentable`].

mod decode;
mod encode;
mod error;
mod value;

pub use decode::{decode, decode_from};
pub use encode::{encode, encode_to};
pub use error::BencodeError;
pub use value::Value;

#[cfg(test)]
mod tests;

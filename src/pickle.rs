//! Python pickle decoding (protocols 0-2, partial 3)
//!
//! Deluge persists its torrent state as a pickled Python dictionary. This
//! module implements just enough of the pickle virtual machine to read
//! that file into the shared [`crate::bencode::Value`] tree. Encoding is
//! deliberately absent; nothing in this tool writes pickle.

mod decode;
mod error;

pub use decode::{decode, decode_from};
pub use error::PickleError;

#[cfg(test)]
mod tests;

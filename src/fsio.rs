//! File-stream access behind an abstract path interface
//!
//! Readers and writers never touch the filesystem directly; they ask a
//! [`FileStreamProvider`] for byte streams by path. The migration
//! transaction implements this trait to stage writes, and
//! [`PlainFileStreamProvider`] opens files directly for plain use.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// An open/read/write/rename failure, wrapping the path it happened on.
#[derive(Debug, Error)]
#[error("unable to access \"{}\": {source}", path.display())]
pub struct IoFailure {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl IoFailure {
    pub fn new(path: &Path, source: std::io::Error) -> Self {
        Self {
            path: path.to_owned(),
            source,
        }
    }
}

pub type ReadStream = Box<dyn Read + Send>;
pub type WriteStream = Box<dyn Write + Send>;

/// Opens byte streams by abstract path.
pub trait FileStreamProvider: Send + Sync {
    fn read_stream(&self, path: &Path) -> Result<ReadStream, IoFailure>;
    fn write_stream(&self, path: &Path) -> Result<WriteStream, IoFailure>;
}

/// Opens files directly, with no staging or redirection.
pub struct PlainFileStreamProvider;

impl FileStreamProvider for PlainFileStreamProvider {
    fn read_stream(&self, path: &Path) -> Result<ReadStream, IoFailure> {
        let file = File::open(path).map_err(|e| IoFailure::new(path, e))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn write_stream(&self, path: &Path) -> Result<WriteStream, IoFailure> {
        let file = File::create(path).map_err(|e| IoFailure::new(path, e))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// Converts raw path bytes to a `PathBuf` without assuming UTF-8.
#[cfg(unix)]
pub(crate) fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
pub(crate) fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

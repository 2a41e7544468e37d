use crate::backup::archive::ArchiveEntry;
use crate::backup::result_error::result::Result;

use std::fs::{File, Metadata};
use std::io::{self, ErrorKind, Read};
use std::path::Path;

/// Streams at most `len` bytes of one source into an archive entry.
///
/// Read errors of the source are kept here so a sink can tell them apart from
/// write errors of the container. A source that ends early counts as a read
/// error. Bytes past `len` are ignored.
#[derive(Debug)]
pub struct SourceReader<R> {
    inner: R,
    len: u64,
    remaining: u64,
    pad: bool,
    error: Option<io::Error>,
}

impl<R: Read> SourceReader<R> {
    pub fn new(inner: R, len: u64) -> Self {
        Self {
            inner,
            len,
            remaining: len,
            pad: false,
            error: None,
        }
    }

    /// After a read error, yields zeros up to `len` instead of failing.
    ///
    /// For containers that commit to an entry size before the data.
    pub fn padded(mut self) -> Self {
        self.pad = true;
        self
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn into_error(self) -> Option<io::Error> {
        self.error
    }
}

impl<R: Read> Read for SourceReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let max = (buf.len() as u64).min(self.remaining) as usize;
        if max == 0 {
            return Ok(0);
        }

        if self.error.is_none() {
            match self.inner.read(&mut buf[..max]) {
                Ok(0) => {
                    self.error = Some(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        format!("source ended {} bytes early", self.remaining),
                    ))
                }
                Ok(n) => {
                    self.remaining -= n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => return Err(e),
                Err(e) => self.error = Some(e),
            }
        }

        if !self.pad {
            return Err(io::Error::other("source read failed"));
        }
        buf[..max].fill(0);
        self.remaining -= max as u64;
        Ok(max)
    }
}

/// Opens a source for streaming. Only regular files qualify.
pub fn open_source(file: &Path) -> Result<(ArchiveEntry, Metadata, File)> {
    let entry = ArchiveEntry::for_source(file)?;
    let handle = File::open(file)?;
    let metadata = handle.metadata()?;
    if !metadata.is_file() {
        return Err(io::Error::other(format!("{:?} is not a regular file", file)).into());
    }
    Ok((entry, metadata, handle))
}

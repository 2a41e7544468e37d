use liblzma::write::XzEncoder;
use std::io::{Error, Seek, Write};
use zip::ZipWriter;

/// Flushes trailing container data and hands back the inner writer.
pub trait Finish<O> {
    fn finish(self) -> Result<O, Error>;
}

impl<W: Write> Finish<W> for XzEncoder<W> {
    fn finish(self) -> Result<W, Error> {
        self.finish()
    }
}

impl<W: Write + Seek> Finish<W> for ZipWriter<W> {
    fn finish(self) -> Result<W, Error> {
        ZipWriter::finish(self).map_err(Error::other)
    }
}

impl<W: Write> Finish<W> for tar::Builder<W> {
    fn finish(self) -> Result<W, Error> {
        self.into_inner()
    }
}

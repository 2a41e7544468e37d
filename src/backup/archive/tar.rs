use crate::backup::archive::source::SourceReader;
use crate::backup::archive::{ArchiveEntry, ArchiveSink};
use crate::backup::compress::{Compressor, CompressorBuilder, CompressorConfig};
use crate::backup::file_ext::FileExtProvider;
use crate::backup::finish::Finish;
use crate::backup::result_error::result::Result;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use validator::Validate;

use std::fs::Metadata;
use std::io::{BufWriter, IntoInnerError, Read};
use std::sync::Arc;

/// Tar archive, optionally compressed.
#[derive(Clone, Default, Validate, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TarConfig {
    #[serde(default)]
    #[validate(nested)]
    pub compression: CompressorConfig,
}

impl TarConfig {
    pub fn open(&self, file: NamedTempFile) -> Result<TarSink> {
        let writer = self.compression.build_compressor(BufWriter::new(file))?;
        let mut builder = tar::Builder::new(writer);
        builder.follow_symlinks(true);
        Ok(TarSink { builder })
    }
}

impl FileExtProvider for TarConfig {
    fn file_ext(&self) -> Option<Arc<str>> {
        Some(
            std::iter::once(Arc::<str>::from("tar"))
                .chain(self.compression.file_ext())
                .join(".")
                .into(),
        )
    }
}

pub struct TarSink {
    builder: tar::Builder<Compressor<BufWriter<NamedTempFile>>>,
}

impl ArchiveSink for TarSink {
    /// The header commits to the size up front, so a source failing midway
    /// is zero filled to keep the stream valid and reported as failed.
    fn append<R: Read>(
        &mut self,
        entry: &ArchiveEntry,
        source: SourceReader<R>,
        metadata: &Metadata,
    ) -> Result<Result<()>> {
        let mut header = tar::Header::new_gnu();
        header.set_metadata(metadata);
        header.set_size(source.len());
        let mut source = source.padded();
        self.builder
            .append_data(&mut header, &*entry.dst, &mut source)?;
        Ok(source.into_error().map_or(Ok(()), |e| Err(e.into())))
    }

    fn close(self) -> Result<NamedTempFile> {
        Ok(Finish::finish(self.builder)?
            .finish()?
            .into_inner()
            .map_err(IntoInnerError::into_error)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::archive::source::tests::BrokenSource;
    use crate::backup::compress::xz::XzConfig;
    use std::fs::File;

    #[test]
    fn test_file_ext() {
        assert_eq!(TarConfig::default().file_ext().unwrap().as_ref(), "tar");
        let xz = TarConfig {
            compression: CompressorConfig::Xz(XzConfig::default()),
        };
        assert_eq!(xz.file_ext().unwrap().as_ref(), "tar.xz");
    }

    #[test]
    fn test_invalid_nested_compression_fails_validation() {
        let config = TarConfig {
            compression: CompressorConfig::Xz(XzConfig {
                level: Some(12),
                thread: None,
            }),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_failed_source_keeps_stream_readable() {
        let metadata = NamedTempFile::new().unwrap().as_file().metadata().unwrap();
        let mut sink = TarConfig::default().open(NamedTempFile::new().unwrap()).unwrap();
        let bad = ArchiveEntry::for_source("/data/bad.bin").unwrap();
        let after = ArchiveEntry::for_source("/data/after.txt").unwrap();

        let res = sink
            .append(&bad, SourceReader::new(BrokenSource { good: 700 }, 2048), &metadata)
            .unwrap();
        assert!(res.is_err());
        sink.append(&after, SourceReader::new(&b"after"[..], 5), &metadata)
            .unwrap()
            .unwrap();

        let file = sink.close().unwrap();
        let mut archive = ::tar::Archive::new(File::open(file.path()).unwrap());
        let mut found = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            found.push((entry.path().unwrap().to_string_lossy().into_owned(), content.len()));
        }
        assert_eq!(
            found,
            vec![("data/bad.bin".to_string(), 2048), ("data/after.txt".to_string(), 5)]
        );
    }
}

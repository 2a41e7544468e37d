use crate::backup::archive::source::SourceReader;
use crate::backup::archive::{ArchiveEntry, ArchiveSink};
use crate::backup::finish::Finish;
use crate::backup::result_error::result::Result;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tempfile::NamedTempFile;
use validator::Validate;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use std::fs::Metadata;
use std::io::{self, Read};

/// Deflate level, 0 to 9. Unset uses the zip default.
#[skip_serializing_none]
#[derive(Clone, Default, Validate, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ZipConfig {
    #[validate(range(min = 0, max = 9))]
    pub level: Option<i64>,
}

impl ZipConfig {
    pub fn open(&self, file: NamedTempFile) -> ZipSink {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(self.level);
        ZipSink {
            writer: ZipWriter::new(file),
            options,
        }
    }
}

pub struct ZipSink {
    writer: ZipWriter<NamedTempFile>,
    options: SimpleFileOptions,
}

impl ArchiveSink for ZipSink {
    fn append<R: Read>(
        &mut self,
        entry: &ArchiveEntry,
        mut source: SourceReader<R>,
        metadata: &Metadata,
    ) -> Result<Result<()>> {
        #[cfg(unix)]
        let options = {
            use std::os::unix::fs::PermissionsExt;
            self.options.unix_permissions(metadata.permissions().mode())
        };
        #[cfg(not(unix))]
        let options = {
            let _ = metadata;
            self.options
        };
        let options = options.large_file(source.len() >= u64::from(u32::MAX));

        self.writer.start_file(entry.dst.to_string(), options)?;
        match io::copy(&mut source, &mut self.writer) {
            Ok(_) => Ok(Ok(())),
            Err(e) => match source.into_error() {
                Some(read_error) => {
                    self.writer.abort_file()?;
                    Ok(Err(read_error.into()))
                }
                None => Err(e.into()),
            },
        }
    }

    fn close(self) -> Result<NamedTempFile> {
        Ok(Finish::finish(self.writer)?)
    }
}

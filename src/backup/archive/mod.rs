pub mod source;
pub mod tar;
pub mod zip;

use crate::backup::archive::source::{open_source, SourceReader};
use crate::backup::archive::tar::TarConfig;
use crate::backup::archive::zip::ZipConfig;
use crate::backup::file_ext::FileExtProvider;
use crate::backup::function_path;
use crate::backup::outcome::BatchOutcome;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};

use bon::Builder;
use chrono::{Local, NaiveDate};
use derive_more::From;
use function_name::named;
use getset::Getters;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use validator::{Validate, ValidationErrors};

use std::collections::HashSet;
use std::fs::Metadata;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::result;
use std::sync::{Arc, OnceLock};

/// Date stamp embedded in archive names.
pub static ARCHIVE_DATE_FORMAT: &str = "%Y%m%d";
pub static DEFAULT_TEMP_MARKER: &str = "~";

/// Container format of the daily archive.
#[derive(Clone, From, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "format")]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum ArchiveFormat {
    Zip(ZipConfig),
    Tar(TarConfig),
}

impl Default for ArchiveFormat {
    fn default() -> Self {
        ArchiveFormat::Zip(ZipConfig::default())
    }
}

impl Validate for ArchiveFormat {
    fn validate(&self) -> result::Result<(), ValidationErrors> {
        match self {
            ArchiveFormat::Zip(inner) => inner.validate(),
            ArchiveFormat::Tar(inner) => inner.validate(),
        }
    }
}

static ZIP_FILE_EXT: OnceLock<Arc<str>> = OnceLock::new();

impl FileExtProvider for ArchiveFormat {
    fn file_ext(&self) -> Option<Arc<str>> {
        match self {
            ArchiveFormat::Zip(_) => Some(ZIP_FILE_EXT.get_or_init(|| "zip".into()).clone()),
            ArchiveFormat::Tar(inner) => inner.file_ext(),
        }
    }
}

/// A source file paired with its name inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub src: Arc<Path>,
    pub dst: Arc<str>,
}

impl ArchiveEntry {
    /// Keeps the path as given, minus root, drive prefix and `.`/`..` steps,
    /// joined with `/`.
    pub fn for_source<P: AsRef<Path>>(src: P) -> Result<ArchiveEntry> {
        let src = src.as_ref();
        let mut parts: Vec<String> = Vec::new();
        for component in src.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::ParentDir => {
                    parts.pop();
                }
                Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            }
        }
        if parts.is_empty() {
            return Err(Error::NoFileName(src.to_path_buf()));
        }
        Ok(ArchiveEntry {
            src: src.into(),
            dst: parts.join("/").into(),
        })
    }
}

/// Writable archive container backed by a temp file.
pub trait ArchiveSink {
    /// Streams `source` into a new entry.
    ///
    /// The outer error is a container failure and ends the archive. The inner
    /// error is a read failure of this source only, after which the container
    /// is still consistent.
    fn append<R: Read>(
        &mut self,
        entry: &ArchiveEntry,
        source: SourceReader<R>,
        metadata: &Metadata,
    ) -> Result<Result<()>>;

    /// Writes trailing container data and returns the finished temp file.
    fn close(self) -> Result<NamedTempFile>;
}

/// One archive produced by [`ArchiveWriter`].
#[derive(Debug)]
pub struct ArchiveRecord {
    pub path: PathBuf,
    pub entries: BatchOutcome<PathBuf>,
    /// Temp-marker files and repeated entry names, neither counted as failures.
    pub skipped: Vec<PathBuf>,
}

/// Bundles a flat file list into `<prefix><YYYYMMDD>.<ext>`.
#[derive(Clone, Debug, Builder, Getters)]
#[getset(get = "pub")]
pub struct ArchiveWriter {
    #[builder(into)]
    prefix: String,
    /// Used when the requested destination is not a directory.
    #[builder(into)]
    fallback_dir: PathBuf,
    #[builder(default)]
    format: ArchiveFormat,
    /// Files whose name starts with this are skipped. Empty disables skipping.
    #[builder(into, default = DEFAULT_TEMP_MARKER.to_owned())]
    temp_marker: String,
}

impl ArchiveWriter {
    pub fn new<S, P, M>(prefix: S, fallback_dir: P, format: ArchiveFormat, temp_marker: M) -> Self
    where
        S: Into<String>,
        P: Into<PathBuf>,
        M: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            fallback_dir: fallback_dir.into(),
            format,
            temp_marker: temp_marker.into(),
        }
    }

    pub fn file_name(&self, date: NaiveDate) -> String {
        format!(
            "{}{}.{}",
            self.prefix,
            date.format(ARCHIVE_DATE_FORMAT),
            self.format.file_ext().unwrap_or("".into())
        )
    }

    pub fn resolve_dir<'a>(&'a self, dest: &'a Path) -> &'a Path {
        if dest.is_dir() {
            dest
        } else {
            tracing::warn!(
                "Destination {:?} is not a directory, writing archive to {:?}",
                dest,
                self.fallback_dir
            );
            &self.fallback_dir
        }
    }

    /// Writes today's archive.
    pub fn write<I, P>(&self, files: I, dest: P) -> Result<ArchiveRecord>
    where
        I: IntoIterator<Item = PathBuf>,
        P: AsRef<Path>,
    {
        self.write_dated(files, dest, Local::now().date_naive())
    }

    /// Writes the archive for `date`, replacing any archive of the same name.
    ///
    /// Unreadable sources are recorded in the returned record and skipped.
    /// Only failures of the container itself are returned as `Err`, in which
    /// case nothing is left behind in the destination.
    #[named]
    pub fn write_dated<I, P>(&self, files: I, dest: P, date: NaiveDate) -> Result<ArchiveRecord>
    where
        I: IntoIterator<Item = PathBuf>,
        P: AsRef<Path>,
    {
        let dir = self.resolve_dir(dest.as_ref());
        let path = dir.join(self.file_name(date));
        tracing::info!("Writing archive {:?}", path);

        let res = tempfile::Builder::new()
            .prefix(".")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(Error::from)
            .with_msg(format!("Creating temp archive in {:?}", dir))
            .and_then(|temp| match &self.format {
                ArchiveFormat::Zip(config) => self.fill(config.open(temp), files),
                ArchiveFormat::Tar(config) => self.fill(config.open(temp)?, files),
            })
            .and_then(|(temp, entries, skipped)| {
                temp.persist(&path)?;
                Ok(ArchiveRecord {
                    path,
                    entries,
                    skipped,
                })
            })
            .with_debug_object_and_fn_name(self.clone(), function_path!())?;

        tracing::info!(
            "Archive {:?} written: {} files added, {} failed, {} skipped",
            res.path,
            res.entries.succeeded.len(),
            res.entries.failed.len(),
            res.skipped.len()
        );
        Ok(res)
    }

    fn fill<S, I>(&self, mut sink: S, files: I) -> Result<(NamedTempFile, BatchOutcome<PathBuf>, Vec<PathBuf>)>
    where
        S: ArchiveSink,
        I: IntoIterator<Item = PathBuf>,
    {
        let mut entries = BatchOutcome::default();
        let mut skipped = Vec::new();
        let mut names = HashSet::new();

        for file in files {
            if self.is_temp_file(&file) {
                tracing::debug!("Skipping temporary file {:?}", file);
                skipped.push(file);
                continue;
            }

            let (entry, metadata, handle) = match open_source(&file) {
                Ok(opened) => opened,
                Err(e) => {
                    tracing::error!("Failed adding {:?} to archive: {}", file, e);
                    entries.push_err(file, e);
                    continue;
                }
            };
            if !names.insert(entry.dst.clone()) {
                tracing::warn!("Skipping {:?}, archive already has {:?}", file, entry.dst);
                skipped.push(file);
                continue;
            }

            tracing::info!("Adding file: {:?}", file);
            let source = SourceReader::new(handle, metadata.len());
            match sink
                .append(&entry, source, &metadata)
                .with_msg(format!("Appending {:?} to archive", entry.dst))?
            {
                Ok(()) => entries.push_ok(file),
                Err(e) => {
                    tracing::error!("Failed adding {:?} to archive: {}", file, e);
                    names.remove(&entry.dst);
                    entries.push_err(file, e);
                }
            }
        }

        Ok((sink.close()?, entries, skipped))
    }

    fn is_temp_file(&self, file: &Path) -> bool {
        !self.temp_marker.is_empty()
            && file
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with(&self.temp_marker))
    }
}

use crate::backup::archive::{ArchiveFormat, ArchiveRecord, ArchiveWriter, DEFAULT_TEMP_MARKER};
use crate::backup::copy::DirectCopier;
use crate::backup::expand::InputExpander;
use crate::backup::file_ext::FileExtProvider;
use crate::backup::filter::{GlobPattern, PathFilter};
use crate::backup::outcome::BatchOutcome;
use crate::backup::progress::ProgressSink;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::retention::{PruneReport, RetentionConfig};
use crate::backup::validate::{validate_dir_exist_or_created, validate_valid_archive_prefix};

use bon::Builder;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::{info, warn};
use validator::Validate;

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

fn default_temp_file_marker() -> String {
    DEFAULT_TEMP_MARKER.to_owned()
}

/// Everything one backup pass needs, loaded once at startup.
#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, Debug, Validate, Builder)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    /// Backup root receiving copies and archives.
    #[validate(custom(function = validate_dir_exist_or_created))]
    #[builder(into)]
    pub out_dir: PathBuf,
    #[validate(custom(function = validate_valid_archive_prefix))]
    #[builder(into)]
    pub archive_prefix: String,
    #[serde(default)]
    #[validate(nested)]
    #[builder(default)]
    pub archive_format: ArchiveFormat,
    /// Sources bundled into the archive.
    #[serde(default)]
    #[builder(default)]
    pub files: Vec<PathBuf>,
    /// Sources copied as-is into the backup root.
    #[serde(default)]
    #[builder(default)]
    pub copy_files: Vec<PathBuf>,
    #[serde(default)]
    #[builder(default)]
    pub excludes: Vec<GlobPattern>,
    #[serde(default = "default_temp_file_marker")]
    #[builder(into, default = default_temp_file_marker())]
    pub temp_file_marker: String,
    #[validate(nested)]
    pub retention: Option<RetentionConfig>,
}

/// Command line adjustments applied on top of the config file.
#[derive(Clone, Debug, Default)]
pub struct RunOverrides {
    pub enable_pruning: bool,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub pruned: Option<PruneReport>,
    pub copied: BatchOutcome<PathBuf>,
    pub archive: ArchiveRecord,
}

impl BackupConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        File::open(path)
            .map_err(Error::from)
            .and_then(|f| {
                serde_yml::from_reader::<_, BackupConfig>(f)
                    .map_err(Error::from)
                    .with_msg(format!("Parse YAML config failed: {:?}", path))
            })
            .and_then(|bc| {
                bc.validate()
                    .map_err(Error::from)
                    .map(|_| bc)
                    .with_msg(format!("Config validation failed: {:?}", path))
            })
    }

    pub fn archive_writer(&self) -> ArchiveWriter {
        ArchiveWriter::new(
            self.archive_prefix.as_str(),
            self.out_dir.as_path(),
            self.archive_format.clone(),
            self.temp_file_marker.as_str(),
        )
    }

    pub fn run_once(
        &self,
        overrides: &RunOverrides,
        progress: &mut dyn ProgressSink,
    ) -> Result<RunSummary> {
        self.run_dated(overrides, progress, Local::now().date_naive())
    }

    /// Prune, copy, expand, archive.
    ///
    /// Direct copy failures are only reported. A retention directory that
    /// exists but cannot be listed does not stop the backup, its error is
    /// returned once the archive is written. Archive container failures are
    /// returned immediately.
    pub fn run_dated(
        &self,
        overrides: &RunOverrides,
        progress: &mut dyn ProgressSink,
        date: NaiveDate,
    ) -> Result<RunSummary> {
        let pruned = self.prune(overrides);

        let writer = self.archive_writer();
        let requested = overrides.output_dir.as_deref().unwrap_or(&self.out_dir);
        let dest = writer.resolve_dir(requested);

        info!("Begin backup & copy procedures into {:?}", dest);
        let copied = DirectCopier::new(progress).copy(self.copy_files.clone(), dest);

        let filter = PathFilter::new(self.excludes.iter().cloned())?;
        let mut files = InputExpander::new(&filter).expand(&self.files);
        let unreachable: HashSet<&PathBuf> = copied.failed_items().collect();
        if !unreachable.is_empty() {
            files.retain(|f| {
                let keep = !unreachable.contains(f);
                if !keep {
                    warn!("Not archiving {:?}, direct copy already failed on it", f);
                }
                keep
            });
        }

        let archive = writer.write_dated(files, dest, date)?;
        info!("Created backup file: {:?}", archive.path);

        Ok(RunSummary {
            pruned: pruned?,
            copied,
            archive,
        })
    }

    fn prune(&self, overrides: &RunOverrides) -> Result<Option<PruneReport>> {
        let retention = match &self.retention {
            Some(r) if r.enabled || overrides.enable_pruning => r.clone(),
            None if overrides.enable_pruning => RetentionConfig::default(),
            _ => {
                info!("Pruning is disabled, skipping");
                return Ok(None);
            }
        };

        let ext = self.archive_format.file_ext().unwrap_or("".into());
        let dir = retention.dir_or(&self.out_dir);
        info!("Pruning old archives in {:?}", dir);
        let res = retention
            .pruner(&self.archive_prefix, &ext)
            .and_then(|pruner| pruner.prune(dir, retention.delete));
        if let Err(e) = &res {
            tracing::error!("Pruning failed: {e}");
        }
        res.map(Some)
    }
}

//! Verbatim copy of individual files into the backup root.

use crate::backup::function_path;
use crate::backup::outcome::BatchOutcome;
use crate::backup::progress::ProgressSink;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;

use filetime::FileTime;
use function_name::named;

use std::path::{Path, PathBuf};

/// Copies files flat into a destination directory, named by base name.
///
/// Sources with the same base name overwrite each other.
pub struct DirectCopier<'a> {
    progress: &'a mut dyn ProgressSink,
}

impl<'a> DirectCopier<'a> {
    pub fn new(progress: &'a mut dyn ProgressSink) -> Self {
        Self { progress }
    }

    /// Copies every file and returns the split between copied and failed.
    ///
    /// `succeeded` is the list later stages should keep working with; failed
    /// sources are dropped from it. Progress is reported after every attempt
    /// as copied count over the total still in play.
    pub fn copy<P: AsRef<Path>>(&mut self, files: Vec<PathBuf>, dest: P) -> BatchOutcome<PathBuf> {
        let dest = dest.as_ref();
        let mut remaining = files.len();
        let mut outcome = BatchOutcome::default();
        tracing::info!("Number of files slated for direct copy: {}", remaining);

        for file in files {
            match copy_one(&file, dest) {
                Ok(target) => {
                    tracing::debug!("Copied {:?} -> {:?}", file, target);
                    outcome.push_ok(file);
                }
                Err(e) => {
                    tracing::debug!("Copy failed for {:?}", file);
                    remaining -= 1;
                    outcome.push_err(file, e);
                }
            }
            self.progress.report(outcome.succeeded.len(), remaining);
        }

        for failure in &outcome.failed {
            tracing::error!("Error copying file {:?}: {}", failure.item, failure.error);
        }
        tracing::info!(
            "Direct copy finished: {} copied, {} failed",
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        outcome
    }
}

#[named]
fn copy_one(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let name = src
        .file_name()
        .ok_or_else(|| Error::NoFileName(src.to_path_buf()))?;
    let target = dest_dir.join(name);

    let metadata = std::fs::metadata(src)
        .map_err(Error::from)
        .with_msg(format!("{} reading metadata of {:?}", function_path!(), src))?;
    std::fs::copy(src, &target)
        .map_err(Error::from)
        .with_msg(format!("{} copying {:?} to {:?}", function_path!(), src, target))?;

    let atime = FileTime::from_last_access_time(&metadata);
    let mtime = FileTime::from_last_modification_time(&metadata);
    if let Err(e) = filetime::set_file_times(&target, atime, mtime) {
        tracing::warn!("Copied {:?} but could not preserve its timestamps: {}", src, e);
    }

    Ok(target)
}

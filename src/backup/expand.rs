//! Expansion of configured backup sources into a flat list of files.

use crate::backup::filter::PathFilter;

use walkdir::{DirEntry, WalkDir};

use std::path::{Path, PathBuf};

/// Turns a mixed list of files and directories into concrete file paths.
///
/// Directories are walked recursively. Excluded subdirectories are pruned
/// before descent and excluded files are dropped. Plain entries pass through
/// untouched, even when they do not exist, so a later stage reports them.
/// Output keeps walk order and is neither sorted nor deduplicated.
#[derive(Debug, Clone, Copy)]
pub struct InputExpander<'a> {
    filter: &'a PathFilter,
}

impl<'a> InputExpander<'a> {
    pub fn new(filter: &'a PathFilter) -> Self {
        Self { filter }
    }

    pub fn expand<I, P>(&self, entries: I) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.expand_inspect(entries, |_| {})
    }

    /// Same as [`expand`](Self::expand), calling `on_dir` for every directory
    /// the walk enters.
    pub fn expand_inspect<I, P, F>(&self, entries: I, mut on_dir: F) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
        F: FnMut(&Path),
    {
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.as_ref();
            if entry.is_dir() {
                let before = files.len();
                self.walk_dir(entry, &mut files, &mut on_dir);
                tracing::debug!(
                    "Expanded {:?} into {} files",
                    entry,
                    files.len() - before
                );
            } else {
                if !entry.exists() {
                    tracing::debug!("Keeping missing source {:?} for later reporting", entry);
                }
                files.push(entry.to_path_buf());
            }
        }
        tracing::info!("Expanded backup sources into {} files", files.len());
        files
    }

    fn walk_dir<F: FnMut(&Path)>(&self, root: &Path, files: &mut Vec<PathBuf>, on_dir: &mut F) {
        let walker = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|de| de.depth() == 0 || !self.is_excluded_entry(de));

        for res in walker {
            match res {
                Ok(de) if de.file_type().is_dir() => {
                    tracing::trace!("Entering {:?}", de.path());
                    on_dir(de.path());
                }
                Ok(de) if de.file_type().is_file() => {
                    tracing::trace!("Including file: {:?}", de.path());
                    files.push(de.into_path());
                }
                Ok(de) => tracing::trace!("Skipping {:?} not a file", de.path()),
                Err(e) => tracing::warn!("Skipping unreadable entry under {:?}: {}", root, e),
            }
        }
    }

    fn is_excluded_entry(&self, de: &DirEntry) -> bool {
        let excluded = self.filter.is_excluded(de.path());
        if excluded {
            tracing::debug!("Excluding {:?}", de.path());
        }
        excluded
    }
}

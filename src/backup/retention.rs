use crate::backup::archive::ARCHIVE_DATE_FORMAT;
use crate::backup::filter::GlobPattern;
use crate::backup::outcome::Failure;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::validate::validate_date_format;

use bon::Builder;
use chrono::NaiveDate;
use getset::Getters;
use globset::GlobMatcher;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use validator::Validate;

use std::io;
use std::path::{Path, PathBuf};

fn default_keep_last() -> usize {
    10
}

/// Retention settings as read from the config file.
///
/// Unset `dir`, `pattern` and `date_format` derive from the backup root,
/// archive prefix and archive extension.
#[skip_serializing_none]
#[derive(Clone, Validate, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    #[serde(default)]
    pub enabled: bool,
    pub dir: Option<PathBuf>,
    pub pattern: Option<GlobPattern>,
    #[validate(custom(function = validate_date_format))]
    pub date_format: Option<String>,
    #[serde(default = "default_keep_last")]
    pub keep_last: usize,
    #[serde(default)]
    pub delete: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: None,
            pattern: None,
            date_format: None,
            keep_last: default_keep_last(),
            delete: false,
        }
    }
}

impl RetentionConfig {
    pub fn dir_or<'a>(&'a self, out_dir: &'a Path) -> &'a Path {
        self.dir.as_deref().unwrap_or(out_dir)
    }

    pub fn pruner(&self, prefix: &str, ext: &str) -> Result<RetentionPruner> {
        let pattern = match &self.pattern {
            Some(pattern) => pattern.clone(),
            None => GlobPattern::new(format!(
                "{}*.{}",
                globset::escape(prefix),
                globset::escape(ext)
            ))?,
        };
        let date_format = self.date_format.clone().unwrap_or_else(|| {
            format!(
                "{}{}.{}",
                prefix.replace('%', "%%"),
                ARCHIVE_DATE_FORMAT,
                ext.replace('%', "%%")
            )
        });
        Ok(RetentionPruner::builder()
            .pattern(pattern)
            .date_format(date_format)
            .keep_last(self.keep_last)
            .build())
    }
}

/// A matched file whose name parsed to a date, with its fate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionDecision {
    pub path: PathBuf,
    pub date: NaiveDate,
    pub keep: bool,
}

#[derive(Debug, Default)]
pub struct PruneReport {
    /// Files past the keep count, whether or not they were deleted.
    pub marked: Vec<PathBuf>,
    pub delete_failures: Vec<Failure<PathBuf>>,
    pub deleted: bool,
}

/// Keeps the newest `keep_last` dated files in a directory.
///
/// Only regular files whose name matches `pattern` and parses with
/// `date_format` take part. Ranking is by descending file name, which equals
/// descending date as long as all names share prefix and suffix and the date
/// is zero padded.
#[derive(Clone, Debug, Builder, Getters)]
#[getset(get = "pub")]
pub struct RetentionPruner {
    #[builder(into)]
    pattern: GlobPattern,
    #[builder(into)]
    date_format: String,
    keep_last: usize,
}

impl RetentionPruner {
    pub fn new<S: Into<String>>(pattern: GlobPattern, date_format: S, keep_last: usize) -> Self {
        Self {
            pattern,
            date_format: date_format.into(),
            keep_last,
        }
    }

    /// Ranks the dated files in `dir` without touching them.
    ///
    /// Returns `None` when `dir` is not a directory.
    pub fn plan<P: AsRef<Path>>(&self, dir: P) -> Result<Option<Vec<RetentionDecision>>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Ok(None);
        }

        let matcher = self.pattern.glob().compile_matcher();
        let mut candidates = Vec::new();
        for entry in std::fs::read_dir(dir)
            .map_err(Error::from)
            .with_msg(format!("Listing retention directory {:?}", dir))?
        {
            let entry = entry?;
            if let Some(name) = self.candidate_name(&matcher, &entry.path()) {
                candidates.push((name, entry.path()));
            }
        }

        let mut rank = 0;
        let decisions: Vec<_> = candidates
            .into_iter()
            .sorted_unstable_by(|(a, _), (b, _)| b.cmp(a))
            .filter_map(|(name, path)| match NaiveDate::parse_from_str(&name, &self.date_format) {
                Ok(date) => Some((path, date)),
                Err(e) => {
                    tracing::debug!("Ignoring {:?}, no date in name: {}", path, e);
                    None
                }
            })
            .map(|(path, date)| {
                rank += 1;
                let keep = rank <= self.keep_last;
                tracing::debug!("File #{} {:?} dated {}: keep={}", rank, path, date, keep);
                RetentionDecision { path, date, keep }
            })
            .collect();
        Ok(Some(decisions))
    }

    /// Marks every dated file past the keep count and, with `do_delete`,
    /// removes it.
    ///
    /// A missing directory is logged and yields an empty report. A file that
    /// cannot be removed is recorded and the rest are still processed.
    pub fn prune<P: AsRef<Path>>(&self, dir: P, do_delete: bool) -> Result<PruneReport> {
        self.prune_with(dir, do_delete, |path| std::fs::remove_file(path))
    }

    /// Same as [`prune`](Self::prune), removing files through `remove`.
    pub fn prune_with<P, F>(&self, dir: P, do_delete: bool, mut remove: F) -> Result<PruneReport>
    where
        P: AsRef<Path>,
        F: FnMut(&Path) -> io::Result<()>,
    {
        let dir = dir.as_ref();
        let mut report = PruneReport {
            deleted: do_delete,
            ..Default::default()
        };

        let Some(decisions) = self.plan(dir)? else {
            tracing::error!(
                "Search path for pruning old archives is invalid, skipping: {:?}",
                dir
            );
            return Ok(report);
        };

        for decision in decisions.into_iter().filter(|d| !d.keep) {
            tracing::info!("Marked excess file: {:?}", decision.path);
            if do_delete {
                if let Err(e) = remove(&decision.path) {
                    tracing::error!("Failed to delete file {:?}: {}", decision.path, e);
                    report.delete_failures.push(Failure {
                        item: decision.path.clone(),
                        error: e.into(),
                    });
                }
            }
            report.marked.push(decision.path);
        }

        if !report.marked.is_empty() {
            tracing::info!(
                "{} files {} for pruning",
                report.marked.len(),
                if do_delete {
                    "have been deleted"
                } else {
                    "identified"
                }
            );
        }
        Ok(report)
    }

    fn candidate_name(&self, matcher: &GlobMatcher, path: &Path) -> Option<String> {
        let name = path.file_name()?;
        if !matcher.is_match(name) || !path.is_file() {
            return None;
        }
        match name.to_str() {
            Some(name) => Some(name.to_owned()),
            None => {
                tracing::debug!("Ignoring non UTF-8 file name {:?}", path);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pruner(keep_last: usize) -> RetentionPruner {
        RetentionPruner::new(
            GlobPattern::new("Backup-Windows-*.zip").unwrap(),
            "Backup-Windows-%Y%m%d.zip",
            keep_last,
        )
    }

    fn fifteen_days(dir: &Path) -> Vec<PathBuf> {
        let files: Vec<PathBuf> = (1..=15)
            .map(|day| dir.join(format!("Backup-Windows-202301{day:02}.zip")))
            .collect();
        for f in &files {
            std::fs::write(f, "zip").unwrap();
        }
        std::fs::write(dir.join("notes.txt"), "notes").unwrap();
        files
    }

    #[test]
    fn test_keep_last_ten_of_fifteen() {
        let temp_dir = TempDir::new().unwrap();
        let files = fifteen_days(temp_dir.path());

        let report = pruner(10).prune(temp_dir.path(), true).unwrap();

        let expected: Vec<PathBuf> = files[..5].iter().rev().cloned().collect();
        assert_eq!(report.marked, expected);
        assert!(report.delete_failures.is_empty());
        assert!(report.deleted);
        for f in &files[..5] {
            assert!(!f.exists());
        }
        for f in &files[5..] {
            assert!(f.exists());
        }
        assert!(temp_dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_delete_failure_is_recorded_and_rest_continue() {
        let temp_dir = TempDir::new().unwrap();
        let files = fifteen_days(temp_dir.path());
        let stuck = files[3].clone();

        let report = pruner(10)
            .prune_with(temp_dir.path(), true, |path| {
                if path == stuck {
                    Err(io::Error::new(io::ErrorKind::PermissionDenied, "in use"))
                } else {
                    std::fs::remove_file(path)
                }
            })
            .unwrap();

        let expected: Vec<PathBuf> = files[..5].iter().rev().cloned().collect();
        assert_eq!(report.marked, expected);
        assert_eq!(report.delete_failures.len(), 1);
        assert_eq!(report.delete_failures[0].item, stuck);
        assert!(stuck.exists());
        for f in files[..5].iter().filter(|f| **f != stuck) {
            assert!(!f.exists());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_dir_records_every_delete_failure() {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let files = fifteen_days(temp_dir.path());
        std::fs::set_permissions(temp_dir.path(), Permissions::from_mode(0o555)).unwrap();
        // Root ignores directory permissions.
        let enforced = std::fs::write(temp_dir.path().join("write-check"), "").is_err();

        let res = enforced.then(|| pruner(10).prune(temp_dir.path(), true));
        std::fs::set_permissions(temp_dir.path(), Permissions::from_mode(0o755)).unwrap();
        let Some(res) = res else {
            return;
        };

        let report = res.unwrap();
        let expected: Vec<PathBuf> = files[..5].iter().rev().cloned().collect();
        assert_eq!(report.marked, expected);
        assert_eq!(
            report.delete_failures.iter().map(|f| &f.item).collect::<Vec<_>>(),
            expected.iter().collect::<Vec<_>>()
        );
        assert!(files.iter().all(|f| f.exists()));
    }

    #[test]
    fn test_dry_run_marks_same_files_without_deleting() {
        let dry_dir = TempDir::new().unwrap();
        let live_dir = TempDir::new().unwrap();
        fifteen_days(dry_dir.path());
        fifteen_days(live_dir.path());

        let dry = pruner(7).prune(dry_dir.path(), false).unwrap();
        let live = pruner(7).prune(live_dir.path(), true).unwrap();

        let names = |v: &[PathBuf]| -> Vec<String> {
            v.iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect()
        };
        assert_eq!(names(&dry.marked), names(&live.marked));
        assert_eq!(dry.marked.len(), 8);
        assert!(!dry.deleted);
        assert!(dry.marked.iter().all(|p| p.exists()));
        assert!(live.marked.iter().all(|p| !p.exists()));
    }

    #[test]
    fn test_kept_set_is_most_recent() {
        let temp_dir = TempDir::new().unwrap();
        for name in [
            "Backup-Windows-20221231.zip",
            "Backup-Windows-20230301.zip",
            "Backup-Windows-20230102.zip",
            "Backup-Windows-20240101.zip",
        ] {
            std::fs::write(temp_dir.path().join(name), "").unwrap();
        }

        let decisions = pruner(2).plan(temp_dir.path()).unwrap().unwrap();
        let kept: Vec<NaiveDate> = decisions.iter().filter(|d| d.keep).map(|d| d.date).collect();
        let pruned: Vec<NaiveDate> = decisions.iter().filter(|d| !d.keep).map(|d| d.date).collect();

        assert_eq!(
            kept,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
            ]
        );
        assert_eq!(
            pruned,
            vec![
                NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
            ]
        );
    }

    #[test]
    fn test_unparsable_and_unmatched_files_are_inert() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        for name in [
            "Backup-Windows-20230101.zip",
            "Backup-Windows-20230102.zip",
            "Backup-Windows-latest.zip",
            "Backup-Windows-20231345.zip",
            "Backup-Windows-20230103.zip.bak",
            "Other-20230104.zip",
        ] {
            std::fs::write(dir.join(name), "").unwrap();
        }
        std::fs::create_dir_all(dir.join("Backup-Windows-20220101.zip")).unwrap();

        let report = pruner(0).prune(dir, true).unwrap();

        assert_eq!(
            report.marked,
            vec![
                dir.join("Backup-Windows-20230102.zip"),
                dir.join("Backup-Windows-20230101.zip"),
            ]
        );
        assert!(dir.join("Backup-Windows-latest.zip").exists());
        assert!(dir.join("Backup-Windows-20231345.zip").exists());
        assert!(dir.join("Backup-Windows-20230103.zip.bak").exists());
        assert!(dir.join("Other-20230104.zip").exists());
        assert!(dir.join("Backup-Windows-20220101.zip").is_dir());
    }

    #[test]
    fn test_unparsable_names_do_not_consume_keep_slots() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        for name in [
            "Backup-Windows-20230101.zip",
            "Backup-Windows-20230102.zip",
            "Backup-Windows-zzz.zip",
        ] {
            std::fs::write(dir.join(name), "").unwrap();
        }

        let report = pruner(1).prune(dir, false).unwrap();
        assert_eq!(report.marked, vec![dir.join("Backup-Windows-20230101.zip")]);
    }

    #[test]
    fn test_fewer_files_than_keep_last() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("Backup-Windows-20230101.zip"), "").unwrap();

        let report = pruner(10).prune(temp_dir.path(), true).unwrap();
        assert!(report.marked.is_empty());
    }

    #[test]
    fn test_missing_directory_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let report = pruner(1).prune(temp_dir.path().join("missing"), true).unwrap();
        assert!(report.marked.is_empty());
        assert!(pruner(1).plan(temp_dir.path().join("missing")).unwrap().is_none());
    }

    #[test]
    fn test_default_pattern_and_format_follow_archive_name() {
        let config = RetentionConfig::default();
        let pruner = config.pruner("Backup[1]-", "tar.xz").unwrap();
        assert_eq!(pruner.date_format(), "Backup[1]-%Y%m%d.tar.xz");
        assert_eq!(pruner.keep_last(), &10);

        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("Backup[1]-20230101.tar.xz"), "").unwrap();
        std::fs::write(temp_dir.path().join("Backup[1]-20230102.tar.xz"), "").unwrap();
        std::fs::write(temp_dir.path().join("Backup1-20230103.tar.xz"), "").unwrap();

        let decisions = pruner.plan(temp_dir.path()).unwrap().unwrap();
        assert_eq!(decisions.len(), 2);
    }

    #[test]
    fn test_percent_in_prefix_is_escaped() {
        let pruner = RetentionConfig::default().pruner("100%-", "zip").unwrap();
        assert_eq!(pruner.date_format(), "100%%-%Y%m%d.zip");
        assert!(validate_date_format(pruner.date_format()).is_ok());
    }

    #[test]
    fn test_config_deserialization() {
        let config: RetentionConfig = serde_json::from_str(
            r#"{"enabled":true,"pattern":"Backup-*.zip","date_format":"Backup-%Y%m%d.zip","delete":true}"#,
        )
        .unwrap();
        assert!(config.enabled);
        assert!(config.delete);
        assert_eq!(config.keep_last, 10);
        assert!(config.validate().is_ok());

        let config: RetentionConfig =
            serde_json::from_str(r#"{"date_format":"Backup-%Y.zip"}"#).unwrap();
        assert!(config.validate().is_err());

        assert!(serde_json::from_str::<RetentionConfig>(r#"{"keep":3}"#).is_err());
    }

    #[test]
    fn test_dir_or() {
        let config = RetentionConfig::default();
        assert_eq!(config.dir_or(Path::new("/out")), Path::new("/out"));
        let config = RetentionConfig {
            dir: Some("/archives".into()),
            ..Default::default()
        };
        assert_eq!(config.dir_or(Path::new("/out")), Path::new("/archives"));
    }
}

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;

use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Starter configuration written on first run.
pub static CONFIG_TEMPLATE: &str = r#"# Backup root. Direct copies and the daily archive land here.
out_dir: ./Backups
# Archive is named <archive_prefix><YYYYMMDD>.<ext>
archive_prefix: Backup-
archive_format:
  format: zip
  level: 6
# Files and directories bundled into the archive.
files: []
# Files copied as-is into out_dir.
copy_files: []
# Glob patterns matched against full paths and file names.
excludes:
  - "*.tmp"
  - node_modules
# Files starting with this are never archived.
temp_file_marker: "~"
retention:
  enabled: false
  keep_last: 10
  # Only lists what would be removed until set to true.
  delete: false
"#;

/// Writes [`CONFIG_TEMPLATE`] to `path`.
///
/// Returns `false` without touching anything when `path` already exists.
pub fn write_template<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    match File::create_new(path) {
        Ok(mut f) => {
            f.write_all(CONFIG_TEMPLATE.as_bytes())
                .map_err(Error::from)
                .with_msg(format!("Writing config template {:?}", path))?;
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(Error::from(e).with_msg(format!("Creating config template {:?}", path))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::backup_config::BackupConfig;
    use tempfile::TempDir;
    use validator::Validate;

    #[test]
    fn test_write_template_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backup.yml");

        assert!(write_template(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), CONFIG_TEMPLATE);

        std::fs::write(&path, "out_dir: /keep\n").unwrap();
        assert!(!write_template(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "out_dir: /keep\n");
    }

    #[test]
    fn test_write_template_missing_parent() {
        let temp_dir = TempDir::new().unwrap();
        assert!(write_template(temp_dir.path().join("nope/backup.yml")).is_err());
    }

    #[test]
    fn test_template_is_valid_config() {
        let temp_dir = TempDir::new().unwrap();
        let mut config: BackupConfig = serde_yml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.archive_prefix, "Backup-");
        assert_eq!(config.excludes.len(), 2);
        assert!(!config.retention.as_ref().unwrap().enabled);

        config.out_dir = temp_dir.path().join("Backups");
        config.validate().unwrap();
        assert!(temp_dir.path().join("Backups").is_dir());
    }
}

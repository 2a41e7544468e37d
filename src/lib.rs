//! # file_backup
//!
//! Daily backup of a fixed set of files into a dated archive, with direct
//! copies of selected files and optional pruning of old archives.
//!
//! ## Features
//!
//! - **Archives**: zip (deflate) or tar with optional XZ, named `<prefix><YYYYMMDD>.<ext>`
//! - **Direct Copies**: selected files copied as-is with their modification time
//! - **Excludes**: glob patterns pruning whole directories before they are walked
//! - **Retention**: keep the newest N dated archives, dry run by default
//!
//! ## Quick Start
//!
//! ```no_run
//! use file_backup::backup::backup_config::{BackupConfig, RunOverrides};
//! use file_backup::backup::progress::ProgressBar;
//!
//! let config = BackupConfig::from_path("backup.yml")?;
//!
//! let mut progress = ProgressBar::new("Copying files");
//! let summary = config.run_once(&RunOverrides::default(), &mut progress)?;
//! progress.finish();
//! println!("{:?}", summary.archive.path);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;

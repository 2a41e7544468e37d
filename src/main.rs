use clap::Parser;
use file_backup::backup::backup_config::{BackupConfig, RunOverrides};
use file_backup::backup::progress::ProgressBar;
use file_backup::backup::result_error::error::Error;
use file_backup::backup::scaffold::write_template;
use std::path::PathBuf;
use std::process::exit;
use tracing::{error, info, warn};

/// Back up files into a dated archive and prune old archives
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file, a template is written there if missing
    #[arg(short, long, default_value = "backup.yml")]
    config: PathBuf,
    /// Prune old archives even when retention is disabled in the config
    #[arg(long)]
    enable_pruning: bool,
    /// Write copies and the archive here instead of the configured out_dir
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    if !args.config.exists() {
        match write_template(&args.config) {
            Ok(true) => warn!(
                "FIRST-RUN: wrote config template to {:?}, edit it and run again",
                args.config
            ),
            Ok(false) => error!("Config {:?} appeared while starting, run again", args.config),
            Err(e) => error!("{e}"),
        }
        exit(1);
    }

    let overrides = RunOverrides {
        enable_pruning: args.enable_pruning,
        output_dir: args.output_dir,
    };

    let res = BackupConfig::from_path(&args.config).and_then(|bc| {
        let mut progress = ProgressBar::new("Copying files");
        let res = bc.run_once(&overrides, &mut progress);
        progress.finish();
        res
    });

    match res {
        Ok(summary) => {
            info!(
                "Backup finished: {} copied, {} copy failures, {} archived, {} archive failures",
                summary.copied.succeeded.len(),
                summary.copied.failed.len(),
                summary.archive.entries.succeeded.len(),
                summary.archive.entries.failed.len()
            );
            if let Some(e) = [summary.copied.into_error(), summary.archive.entries.into_error()]
                .into_iter()
                .flatten()
                .reduce(Error::chain)
            {
                warn!("Received non fatal errors:\n{e}");
            }
        }
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    }
}

//! Site Backup - Main entry point
//!
//! Command-line front end for importing and exporting WordPress site backups.

use anyhow::{bail, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use site_backup::{
    config::Config,
    exporters::{ExportIncludes, ExportOptions},
    runtime::WpCliRuntime,
    utils, BackupArchiveInfo, BackupEvent, DestinationSite, EventSink, ImportExportManager,
    ImportOptions,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a backup archive into a site directory
    Import {
        /// Backup archive (.zip, .tar.gz, .wpress or .sql)
        archive: PathBuf,

        #[command(flatten)]
        site: SiteArgs,
    },

    /// Export a site to a .sql dump or a .zip / .tar.gz archive
    Export {
        /// Destination file
        output: PathBuf,

        #[command(flatten)]
        site: SiteArgs,

        /// PHP version recorded in the archive metadata
        #[arg(long, default_value = "8.2")]
        php_version: String,

        /// Write one dump per table instead of a single file
        #[arg(long)]
        split_by_table: bool,

        #[arg(long)]
        no_database: bool,
        #[arg(long)]
        no_uploads: bool,
        #[arg(long)]
        no_plugins: bool,
        #[arg(long)]
        no_themes: bool,
    },

    /// Show the detected provider and entries of an archive
    Inspect {
        archive: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(ClapArgs, Debug)]
struct SiteArgs {
    /// Site root directory
    #[arg(long, value_name = "DIR")]
    site_path: PathBuf,

    /// Site identifier used in logs
    #[arg(long, default_value = "local")]
    site_id: String,

    /// Site URL; the imported database is rewritten to it
    #[arg(long, default_value = "")]
    site_url: String,
}

impl SiteArgs {
    fn destination(&self) -> DestinationSite {
        DestinationSite {
            id: self.site_id.clone(),
            path: self.site_path.clone(),
            url: self.site_url.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)?
    } else {
        Config::from_env()?
    };

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    debug!("site-backup v{}", env!("CARGO_PKG_VERSION"));

    let runtime = Arc::new(WpCliRuntime::new(config.runtime.clone()));
    let manager = ImportExportManager::new(runtime, config.clone());
    let events = EventSink::new(log_event);

    match args.command {
        Command::Import { archive, site } => {
            let cancel = CancellationToken::new();
            tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

            let result = manager
                .import_backup(
                    &BackupArchiveInfo::new(archive),
                    &site.destination(),
                    &events,
                    ImportOptions { cancel },
                )
                .await?;
            match result {
                Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                None => warn!("Import cancelled"),
            }
        }
        Command::Export {
            output,
            site,
            php_version,
            split_by_table,
            no_database,
            no_uploads,
            no_plugins,
            no_themes,
        } => {
            let options = ExportOptions {
                site: site.destination(),
                backup_file: output,
                includes: ExportIncludes {
                    database: !no_database,
                    uploads: !no_uploads,
                    plugins: !no_plugins,
                    themes: !no_themes,
                },
                php_version,
                split_database_dump_by_table: split_by_table,
            };
            if !manager.export_backup(&options, &events).await? {
                bail!("Unsupported export destination: {}", options.backup_file.display());
            }
            println!("{}", serde_json::json!({ "exported": options.backup_file }));
        }
        Command::Inspect { archive } => {
            let inspection = manager.inspect(&BackupArchiveInfo::new(archive)).await?;
            println!("{}", serde_json::to_string_pretty(&inspection)?);
        }
        Command::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn log_event(event: BackupEvent) {
    match &event {
        BackupEvent::ExtractProgress { progress } | BackupEvent::ArchiveProgress { progress } => {
            debug!(kind = event.kind(), "{:.0}%", progress * 100.0)
        }
        BackupEvent::ExtractError { error } => warn!(kind = event.kind(), "{}", error),
        _ => info!(kind = event.kind(), "{}", event.kind()),
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received SIGINT (Ctrl+C), cancelling after the current phase...");
        cancel.cancel();
    }
}

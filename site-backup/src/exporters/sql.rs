use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{destination_name, file_timestamp, BackupExporter, ExportOptions};
use crate::events::{BackupEvent, EventSink};
use crate::fs::{move_file, remove_if_exists};
use crate::runtime::{run_checked, DatabaseCommand, SiteRuntime};
use crate::utils::errors::{BackupError, Result};

const DEFAULT_TABLE_PREFIX: &str = "wp_";

/// Database-only export to a `.sql` destination.
///
/// With `split_database_dump_by_table`, one `<table>.sql` per table is written
/// to the directory containing the destination instead.
pub struct SqlExporter {
    runtime: Arc<dyn SiteRuntime>,
}

impl SqlExporter {
    pub fn new(runtime: Arc<dyn SiteRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl BackupExporter for SqlExporter {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn can_handle(&self, options: &ExportOptions) -> bool {
        destination_name(options).ends_with(".sql")
    }

    async fn export(&self, options: &ExportOptions, events: &EventSink) -> Result<()> {
        if !options.includes.database {
            info!("Database excluded from export, nothing to write to {}", options.backup_file.display());
            return Ok(());
        }

        let site_path = &options.site.path;
        events.emit(BackupEvent::ExportDatabaseStart);

        if options.split_database_dump_by_table {
            let directory = options
                .backup_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            export_tables(self.runtime.as_ref(), site_path, &directory).await?;
        } else {
            export_database(self.runtime.as_ref(), site_path, &options.backup_file).await?;
        }

        events.emit(BackupEvent::ExportDatabaseComplete);
        Ok(())
    }
}

/// Dump the whole database to `destination`.
///
/// The dump tool runs in the site's own context, so the file is first written
/// inside the site directory and then moved.
pub async fn export_database(runtime: &dyn SiteRuntime, site_path: &Path, destination: &Path) -> Result<()> {
    let staged = site_path.join(format!("studio-backup-db-export-{}.sql", file_timestamp()));
    dump_via_staging(runtime, site_path, &staged, Vec::new(), destination).await?;
    info!("Exported database to {}", destination.display());
    Ok(())
}

/// Dump every portable table to `<directory>/<table>.sql`.
///
/// User tables are skipped. Returns the written files.
pub async fn export_tables(runtime: &dyn SiteRuntime, site_path: &Path, directory: &Path) -> Result<Vec<PathBuf>> {
    let tables = list_tables(runtime, site_path).await?;
    tokio::fs::create_dir_all(directory).await?;

    let prefix = table_prefix(&tables);
    let timestamp = file_timestamp();
    let mut written = Vec::new();
    for table in tables.iter().filter(|t| is_portable_table(t, &prefix)).cloned() {
        let staged = site_path.join(format!("studio-backup-db-export-{}-{}.sql", timestamp, table));
        let destination = directory.join(format!("{}.sql", table));
        dump_via_staging(runtime, site_path, &staged, vec![table], &destination).await?;
        written.push(destination);
    }

    info!("Exported {} tables to {}", written.len(), directory.display());
    Ok(written)
}

async fn list_tables(runtime: &dyn SiteRuntime, site_path: &Path) -> Result<Vec<String>> {
    let output = run_checked(runtime, site_path, DatabaseCommand::ListTables).await?;
    // An incomplete table list would produce a silently broken backup
    let tables: Vec<String> = serde_json::from_str(output.stdout.trim())?;
    debug!("Site has {} tables", tables.len());
    Ok(tables)
}

/// Table prefix of the site, taken from its `<prefix>options` table.
fn table_prefix(tables: &[String]) -> String {
    tables
        .iter()
        .filter_map(|t| t.strip_suffix("options"))
        .min_by_key(|prefix| prefix.len())
        .unwrap_or(DEFAULT_TABLE_PREFIX)
        .to_string()
}

/// User accounts are not carried between sites; plugin tables ending in `users` are.
fn is_portable_table(table: &str, prefix: &str) -> bool {
    !matches!(table.strip_prefix(prefix), Some("users" | "usermeta"))
}

async fn dump_via_staging(
    runtime: &dyn SiteRuntime,
    site_path: &Path,
    staged: &Path,
    tables: Vec<String>,
    destination: &Path,
) -> Result<()> {
    let command = DatabaseCommand::Export {
        file: staged.to_path_buf(),
        tables,
    };

    let outcome = match run_checked(runtime, site_path, command).await {
        Ok(_) => move_file(staged, destination).await.map_err(BackupError::from),
        Err(e) => Err(e),
    };
    if outcome.is_err() {
        if let Err(e) = remove_if_exists(staged).await {
            warn!("Failed to remove {}: {}", staged.display(), e);
        }
    }
    outcome
}

//! Backup exporters: produce a database dump or a full-site archive.

mod archive;
mod sql;

pub use archive::ArchiveExporter;
pub use sql::{export_database, export_tables, SqlExporter};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::backup::SiteInfo;
use crate::events::EventSink;
use crate::utils::errors::Result;

/// Which parts of the site to include; each flag is honoured independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportIncludes {
    pub database: bool,
    pub uploads: bool,
    pub plugins: bool,
    pub themes: bool,
}

impl Default for ExportIncludes {
    fn default() -> Self {
        Self {
            database: true,
            uploads: true,
            plugins: true,
            themes: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    pub site: SiteInfo,
    pub backup_file: PathBuf,
    #[serde(default)]
    pub includes: ExportIncludes,
    pub php_version: String,
    #[serde(default)]
    pub split_database_dump_by_table: bool,
}

#[async_trait]
pub trait BackupExporter: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, options: &ExportOptions) -> bool;

    async fn export(&self, options: &ExportOptions, events: &EventSink) -> Result<()>;
}

/// Lowercased file name of the export destination.
pub(crate) fn destination_name(options: &ExportOptions) -> String {
    options
        .backup_file
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// ISO 8601-like UTC timestamp usable in file names.
pub(crate) fn file_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

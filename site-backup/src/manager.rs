//! Import/export orchestration.
//!
//! Import: handler -> validator -> extraction into a fresh temporary
//! directory -> importer. Export: first exporter that accepts the options.
//! The temporary directory is removed on every exit path.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use crate::backup::SiteInfo as DestinationSite;

use crate::backup::{BackupArchiveInfo, BackupProvider, SiteInfo};
use crate::config::Config;
use crate::events::{BackupEvent, EventSink};
use crate::exporters::{ArchiveExporter, BackupExporter, ExportOptions, SqlExporter};
use crate::handlers::handler_for;
use crate::importers::{planned_site_paths, BackupImporter, ImportResult};
use crate::runtime::SiteRuntime;
use crate::utils::errors::{BackupError, Result};
use crate::validators::{default_validators, select_validator, BackupValidator};

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Checked between phases; a cancelled import yields `Ok(None)`
    pub cancel: CancellationToken,
}

/// What an archive contains, without extracting it.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveInspection {
    pub archive: PathBuf,
    pub handler: &'static str,
    pub provider: Option<BackupProvider>,
    pub files: Vec<String>,
    /// Site-relative paths an import would write
    pub planned_files: Vec<PathBuf>,
}

pub struct ImportExportManager {
    runtime: Arc<dyn SiteRuntime>,
    config: Config,
    validators: Vec<Box<dyn BackupValidator>>,
}

impl ImportExportManager {
    pub fn new(runtime: Arc<dyn SiteRuntime>, config: Config) -> Self {
        Self {
            runtime,
            config,
            validators: default_validators(),
        }
    }

    /// Import `archive` into `destination`.
    ///
    /// Returns `Ok(None)` when the import was cancelled through `options`.
    pub async fn import_backup(
        &self,
        archive: &BackupArchiveInfo,
        destination: &DestinationSite,
        events: &EventSink,
        options: ImportOptions,
    ) -> Result<Option<ImportResult>> {
        let operation_id = Uuid::new_v4();
        let archive_path = archive.path.clone();
        info!(
            operation_id = %operation_id,
            archive = %archive_path.display(),
            "Starting backup import"
        );

        let handler = handler_for(&archive_path)
            .ok_or_else(|| BackupError::UnsupportedArchiveFormat(archive_path.clone()))?;
        let site = self.resolve_site(destination).await?;
        events.emit(BackupEvent::ImportStart);

        events.emit(BackupEvent::ValidationStart);
        let files = {
            let handler = handler.clone();
            let archive_path = archive_path.clone();
            tokio::task::spawn_blocking(move || handler.list_files(&archive_path)).await??
        };
        let validator = select_validator(&self.validators, &files)
            .ok_or_else(|| BackupError::UnrecognizedBackupProvider(archive_path.clone()))?;
        events.emit(BackupEvent::ValidationComplete {
            provider: validator.provider(),
        });
        info!(
            operation_id = %operation_id,
            provider = %validator.provider(),
            "Detected {} entries",
            files.len()
        );

        if options.cancel.is_cancelled() {
            info!(operation_id = %operation_id, "Import cancelled");
            return Ok(None);
        }
        if self.runtime.is_site_running(&site.id).await {
            warn!("Site {} is running while its files are replaced", site.id);
        }

        let temp_root = self.config.temp_root();
        tokio::fs::create_dir_all(&temp_root).await?;
        let extraction = tempfile::Builder::new()
            .prefix(&format!("site-backup-{}-", operation_id))
            .tempdir_in(&temp_root)?;
        debug!("Extracting into {}", extraction.path().display());

        let outcome: Result<Option<ImportResult>> = async {
            {
                let handler = handler.clone();
                let archive_path = archive_path.clone();
                let destination = extraction.path().to_path_buf();
                let events = events.clone();
                tokio::task::spawn_blocking(move || {
                    handler.extract_files(&archive_path, &destination, &events)
                })
                .await??;
            }

            if options.cancel.is_cancelled() {
                return Ok(None);
            }

            let contents = validator.parse_backup_contents(&files, extraction.path());
            BackupImporter::new(contents, self.runtime.clone())
                .with_events(events.clone())
                .with_cancel(options.cancel.clone())
                .with_copy_buffer_size(self.config.import.copy_buffer_size)
                .import(&site)
                .await
        }
        .await;

        if let Err(e) = extraction.close() {
            warn!("Failed to remove extraction directory: {}", e);
        }

        match &outcome {
            Ok(Some(_)) => {
                events.emit(BackupEvent::ImportComplete);
                info!(operation_id = %operation_id, "Backup import complete");
            }
            Ok(None) => info!(operation_id = %operation_id, "Import cancelled"),
            Err(e) => warn!(operation_id = %operation_id, kind = e.kind(), "Backup import failed: {}", e),
        }
        outcome
    }

    /// Export a site. Returns false when no exporter accepts the destination.
    pub async fn export_backup(&self, options: &ExportOptions, events: &EventSink) -> Result<bool> {
        let exporters = self.exporters();
        let Some(exporter) = exporters.iter().find(|e| e.can_handle(options)) else {
            warn!("No exporter for {}", options.backup_file.display());
            return Ok(false);
        };

        let mut options = options.clone();
        options.site = self.resolve_site(&options.site).await?;

        let operation_id = Uuid::new_v4();
        info!(
            operation_id = %operation_id,
            exporter = exporter.name(),
            destination = %options.backup_file.display(),
            "Starting backup export"
        );
        events.emit(BackupEvent::ExportStart);
        exporter.export(&options, events).await?;
        events.emit(BackupEvent::ExportComplete);
        info!(operation_id = %operation_id, "Backup export complete");
        Ok(true)
    }

    /// List an archive and detect its provider without extracting it.
    pub async fn inspect(&self, archive: &BackupArchiveInfo) -> Result<ArchiveInspection> {
        let handler = handler_for(&archive.path)
            .ok_or_else(|| BackupError::UnsupportedArchiveFormat(archive.path.clone()))?;
        let files = {
            let handler = handler.clone();
            let archive_path = archive.path.clone();
            tokio::task::spawn_blocking(move || handler.list_files(&archive_path)).await??
        };

        let validator = select_validator(&self.validators, &files);
        let planned_files = validator
            .map(|v| planned_site_paths(&v.parse_backup_contents(&files, Path::new(""))))
            .unwrap_or_default();

        Ok(ArchiveInspection {
            archive: archive.path.clone(),
            handler: handler.name(),
            provider: validator.map(|v| v.provider()),
            files,
            planned_files,
        })
    }

    fn exporters(&self) -> Vec<Box<dyn BackupExporter>> {
        vec![
            Box::new(SqlExporter::new(self.runtime.clone())),
            Box::new(ArchiveExporter::new(
                self.runtime.clone(),
                self.config.export.compression_level,
                self.config.temp_root(),
            )),
        ]
    }

    /// Fill in the site path from the runtime when the caller left it empty.
    async fn resolve_site(&self, site: &SiteInfo) -> Result<SiteInfo> {
        if !site.path.as_os_str().is_empty() {
            return Ok(site.clone());
        }
        let path = self
            .runtime
            .site_path(&site.id)
            .await
            .ok_or_else(|| BackupError::Runtime(format!("unknown site '{}'", site.id)))?;
        Ok(SiteInfo {
            path,
            ..site.clone()
        })
    }
}

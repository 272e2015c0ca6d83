use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

use tracing::{debug, info, warn};
use ::zip::ZipArchive;

use super::{entry_path, is_allowed_entry, progress_callback, with_extraction_events, ArchiveHandler};
use crate::events::EventSink;
use crate::progress::{format_bytes, ByteProgress, ProgressReader};
use crate::utils::errors::{BackupError, Result};

/// Zip archives, read one entry at a time.
pub struct ZipHandler;

fn open(archive: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(archive).map_err(|e| BackupError::extraction(archive, e))?;
    ZipArchive::new(BufReader::new(file)).map_err(|e| BackupError::extraction(archive, e))
}

impl ArchiveHandler for ZipHandler {
    fn name(&self) -> &'static str {
        "zip"
    }

    fn list_files(&self, archive: &Path) -> Result<Vec<String>> {
        let mut zip = open(archive)?;
        let mut files = Vec::with_capacity(zip.len());

        for index in 0..zip.len() {
            let entry = zip
                .by_index_raw(index)
                .map_err(|e| BackupError::extraction(archive, e))?;
            if !entry.is_dir() && is_allowed_entry(entry.name()) && entry_path(entry.name()).is_some() {
                files.push(entry.name().to_string());
            }
        }

        Ok(files)
    }

    fn extract_files(&self, archive: &Path, destination: &Path, events: &EventSink) -> Result<()> {
        with_extraction_events(events, || {
            let mut zip = open(archive)?;

            let mut total_bytes = 0u64;
            for index in 0..zip.len() {
                let entry = zip
                    .by_index_raw(index)
                    .map_err(|e| BackupError::extraction(archive, e))?;
                if !entry.is_dir() && is_allowed_entry(entry.name()) {
                    total_bytes += entry.size();
                }
            }
            info!(
                "Extracting {} ({}) to {}",
                archive.display(),
                format_bytes(total_bytes),
                destination.display()
            );

            let mut progress = ByteProgress::new(total_bytes, progress_callback(events));

            for index in 0..zip.len() {
                let entry = zip
                    .by_index(index)
                    .map_err(|e| BackupError::extraction(archive, e))?;
                if entry.is_dir() || !is_allowed_entry(entry.name()) {
                    continue;
                }
                let Some(relative) = entry_path(entry.name()) else {
                    warn!("Skipped entry outside the extraction directory: {}", entry.name());
                    continue;
                };
                let target = destination.join(relative);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| BackupError::extraction(parent, e))?;
                }

                debug!("Extracting entry: {}", entry.name());
                let mut output = File::create(&target).map_err(|e| BackupError::extraction(&target, e))?;
                let mut reader = ProgressReader::new(entry, &mut progress);
                io::copy(&mut reader, &mut output).map_err(|e| BackupError::extraction(&target, e))?;
            }

            progress.finish();
            Ok(())
        })
    }
}

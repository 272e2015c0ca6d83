use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::{debug, info, warn};

use super::{entry_path, is_allowed_entry, progress_callback, with_extraction_events, ArchiveHandler};
use crate::events::EventSink;
use crate::progress::{format_bytes, ByteProgress, ProgressReader};
use crate::utils::errors::{BackupError, Result};

/// Gzip-compressed tar archives (`.tar.gz`, `.gz`, `.wpress`), streamed in a single pass.
pub struct TarGzHandler;

impl ArchiveHandler for TarGzHandler {
    fn name(&self) -> &'static str {
        "tar.gz"
    }

    fn list_files(&self, archive: &Path) -> Result<Vec<String>> {
        let file = File::open(archive).map_err(|e| BackupError::extraction(archive, e))?;
        let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        let mut files = Vec::new();

        let entries = tar.entries().map_err(|e| BackupError::extraction(archive, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| BackupError::extraction(archive, e))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = entry
                .path()
                .map_err(|e| BackupError::extraction(archive, e))?
                .to_string_lossy()
                .into_owned();
            if is_allowed_entry(&path) && entry_path(&path).is_some() {
                files.push(path);
            }
        }

        Ok(files)
    }

    fn extract_files(&self, archive: &Path, destination: &Path, events: &EventSink) -> Result<()> {
        with_extraction_events(events, || {
            let file = File::open(archive).map_err(|e| BackupError::extraction(archive, e))?;
            let compressed_bytes = file
                .metadata()
                .map_err(|e| BackupError::extraction(archive, e))?
                .len();
            info!(
                "Extracting {} ({}) to {}",
                archive.display(),
                format_bytes(compressed_bytes),
                destination.display()
            );

            // Progress is measured on compressed bytes; the uncompressed size is unknown up front.
            let mut progress = ByteProgress::new(compressed_bytes, progress_callback(events));
            {
                let reader = ProgressReader::new(file, &mut progress);
                let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(reader)));

                let entries = tar.entries().map_err(|e| BackupError::extraction(archive, e))?;
                for entry in entries {
                    let mut entry = entry.map_err(|e| BackupError::extraction(archive, e))?;
                    // Links and special files are not part of a site backup.
                    if !entry.header().entry_type().is_file() {
                        continue;
                    }
                    let path = entry
                        .path()
                        .map_err(|e| BackupError::extraction(archive, e))?
                        .to_string_lossy()
                        .into_owned();
                    if !is_allowed_entry(&path) {
                        continue;
                    }

                    let Some(relative) = entry_path(&path) else {
                        warn!("Skipped entry outside the extraction directory: {}", path);
                        continue;
                    };
                    let target = destination.join(relative);
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent).map_err(|e| BackupError::extraction(parent, e))?;
                    }

                    debug!("Extracting entry: {}", path);
                    let mut output = File::create(&target).map_err(|e| BackupError::extraction(&target, e))?;
                    io::copy(&mut entry, &mut output).map_err(|e| BackupError::extraction(&target, e))?;
                }
            }

            progress.finish();
            Ok(())
        })
    }
}

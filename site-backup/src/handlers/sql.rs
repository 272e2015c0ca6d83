use std::fs;
use std::path::Path;

use super::{with_extraction_events, ArchiveHandler};
use crate::events::{BackupEvent, EventSink};
use crate::utils::errors::{BackupError, Result};

/// A bare `.sql` dump: a one-entry "archive" that is copied as-is.
pub struct SqlHandler;

fn file_name(archive: &Path) -> Result<String> {
    archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| BackupError::UnsupportedArchiveFormat(archive.to_path_buf()))
}

impl ArchiveHandler for SqlHandler {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn list_files(&self, archive: &Path) -> Result<Vec<String>> {
        Ok(vec![file_name(archive)?])
    }

    fn extract_files(&self, archive: &Path, destination: &Path, events: &EventSink) -> Result<()> {
        with_extraction_events(events, || {
            let target = destination.join(file_name(archive)?);
            fs::copy(archive, &target).map_err(|e| BackupError::extraction(&target, e))?;
            events.emit(BackupEvent::ExtractProgress { progress: 1.0 });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lists_basename_and_copies() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let dump = temp_dir.path().join("site-dump.sql");
        fs::write(&dump, "INSERT INTO wp_options VALUES (1);")?;
        let dest = temp_dir.path().join("out");
        fs::create_dir_all(&dest)?;

        assert_eq!(SqlHandler.list_files(&dump)?, vec!["site-dump.sql"]);

        SqlHandler.extract_files(&dump, &dest, &EventSink::noop())?;
        assert_eq!(
            fs::read_to_string(dest.join("site-dump.sql"))?,
            "INSERT INTO wp_options VALUES (1);"
        );
        Ok(())
    }
}

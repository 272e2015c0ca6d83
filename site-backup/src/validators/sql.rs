use std::path::Path;

use super::{extracted_path, BackupValidator};
use crate::backup::{BackupContents, BackupProvider};

/// A lone SQL dump, as listed by the SQL handler.
pub struct SqlValidator;

impl BackupValidator for SqlValidator {
    fn provider(&self) -> BackupProvider {
        BackupProvider::Sql
    }

    fn can_handle(&self, files: &[String]) -> bool {
        matches!(files, [only] if only.to_ascii_lowercase().ends_with(".sql") && !only.contains(['/', '\\']))
    }

    fn parse_backup_contents(&self, files: &[String], extraction_directory: &Path) -> BackupContents {
        let mut contents = BackupContents::new(BackupProvider::Sql, extraction_directory, "");
        contents.sql_files = files.iter().map(|f| extracted_path(extraction_directory, f)).collect();
        contents.sort_sql_files();
        contents
    }
}

use std::path::Path;

use super::{bucket_content, extracted_path, normalized, BackupValidator};
use crate::backup::{BackupContents, BackupProvider};

const DATABASE_FILE: &str = "database.sql";
const PACKAGE_FILE: &str = "package.json";

/// All-in-One WP Migration (`.wpress`) archives.
///
/// Content buckets sit at the archive root and may use either `/` or `\`
/// as separator, depending on the platform that produced the export.
pub struct WpressValidator;

impl BackupValidator for WpressValidator {
    fn provider(&self) -> BackupProvider {
        BackupProvider::Wpress
    }

    fn can_handle(&self, files: &[String]) -> bool {
        let has_database = files.iter().any(|f| f == DATABASE_FILE);
        let has_package = files.iter().any(|f| f == PACKAGE_FILE);
        let has_content = files.iter().any(|f| {
            let entry = normalized(f);
            ["uploads/", "plugins/", "themes/"]
                .iter()
                .any(|dir| entry.starts_with(dir))
        });
        has_database && has_package && has_content
    }

    fn parse_backup_contents(&self, files: &[String], extraction_directory: &Path) -> BackupContents {
        let mut contents = BackupContents::new(BackupProvider::Wpress, extraction_directory, "");
        contents.wp_content.mu_plugins = Some(Vec::new());

        for file in files {
            let entry = normalized(file);
            let full_path = extracted_path(extraction_directory, file);

            if entry == DATABASE_FILE {
                contents.sql_files.push(full_path);
            } else if entry == PACKAGE_FILE {
                contents.meta_file = Some(full_path);
            } else {
                bucket_content(&mut contents, &entry, full_path);
            }
        }

        contents.sort_sql_files();
        contents
    }
}

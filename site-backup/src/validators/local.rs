use std::path::Path;

use super::{bucket_content, extracted_path, is_content_entry, is_file_in, normalized, BackupValidator};
use crate::backup::{BackupContents, BackupProvider};

const SQL_DIR: &str = "app/sql/";
const WP_CONTENT: &str = "app/public/wp-content/";
const WP_CONFIG: &str = "app/public/wp-config.php";
const META_FILE: &str = "local-site.json";

/// Local (by Flywheel) site exports, laid out like Jetpack below `app/`.
pub struct LocalValidator;

impl BackupValidator for LocalValidator {
    fn provider(&self) -> BackupProvider {
        BackupProvider::Local
    }

    fn can_handle(&self, files: &[String]) -> bool {
        let has_sql = files
            .iter()
            .any(|f| is_file_in(&normalized(f), SQL_DIR, ".sql"));
        let has_content = files
            .iter()
            .any(|f| is_content_entry(&normalized(f), WP_CONTENT, true));
        has_sql && has_content
    }

    fn parse_backup_contents(&self, files: &[String], extraction_directory: &Path) -> BackupContents {
        let mut contents =
            BackupContents::new(BackupProvider::Local, extraction_directory, "app/public/wp-content");
        contents.wp_content.mu_plugins = Some(Vec::new());

        for file in files {
            let entry = normalized(file);
            let full_path = extracted_path(extraction_directory, file);

            if is_file_in(&entry, SQL_DIR, ".sql") {
                contents.sql_files.push(full_path);
            } else if let Some(relative) = entry.strip_prefix(WP_CONTENT) {
                bucket_content(&mut contents, relative, full_path);
            } else if entry == WP_CONFIG {
                contents.wp_config = full_path;
            } else if entry == META_FILE {
                contents.meta_file = Some(full_path);
            }
        }

        contents.sort_sql_files();
        contents
    }
}

use std::path::Path;

use super::{bucket_content, extracted_path, is_content_entry, is_file_in, normalized, BackupValidator};
use crate::backup::{BackupContents, BackupProvider};

const WP_CONTENT: &str = "wp-content/";

/// Jetpack (VaultPress) downloadable backups.
///
/// ```text
/// sql/*.sql
/// wp-content/{uploads,plugins,themes,mu-plugins}/...
/// wp-config.php   (optional)
/// meta.json       (optional)
/// ```
pub struct JetpackValidator;

impl BackupValidator for JetpackValidator {
    fn provider(&self) -> BackupProvider {
        BackupProvider::Jetpack
    }

    fn can_handle(&self, files: &[String]) -> bool {
        let has_sql = files
            .iter()
            .any(|f| is_file_in(&normalized(f), "sql/", ".sql"));
        let has_content = files
            .iter()
            .any(|f| is_content_entry(&normalized(f), WP_CONTENT, true));
        has_sql && has_content
    }

    fn parse_backup_contents(&self, files: &[String], extraction_directory: &Path) -> BackupContents {
        let mut contents = BackupContents::new(BackupProvider::Jetpack, extraction_directory, "wp-content");
        contents.wp_content.mu_plugins = Some(Vec::new());

        for file in files {
            let entry = normalized(file);
            let full_path = extracted_path(extraction_directory, file);

            if is_file_in(&entry, "sql/", ".sql") {
                contents.sql_files.push(full_path);
            } else if let Some(relative) = entry.strip_prefix(WP_CONTENT) {
                bucket_content(&mut contents, relative, full_path);
            } else if entry == "wp-config.php" {
                contents.wp_config = full_path;
            } else if entry == "meta.json" {
                contents.meta_file = Some(full_path);
            }
            // wp-admin/, wp-includes/ and root core files are not part of the site's content
        }

        contents.sort_sql_files();
        contents
    }
}

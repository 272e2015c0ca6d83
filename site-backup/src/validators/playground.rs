use std::path::Path;

use super::{bucket_content, extracted_path, is_content_entry, is_file_in, normalized, BackupValidator};
use crate::backup::{BackupContents, BackupProvider};

const DATABASE_DIR: &str = "wp-content/database/";
const WP_CONTENT: &str = "wp-content/";

/// WordPress Playground exports: a full site tree with a SQLite database.
///
/// The `.sqlite` file is reported through `sql_files`. There is no mu-plugins
/// bucket; an optional root `blueprint.json` serves as the meta file.
pub struct PlaygroundValidator;

impl BackupValidator for PlaygroundValidator {
    fn provider(&self) -> BackupProvider {
        BackupProvider::Playground
    }

    fn can_handle(&self, files: &[String]) -> bool {
        let has_database = files
            .iter()
            .any(|f| is_file_in(&normalized(f), DATABASE_DIR, ".sqlite"));
        let has_content = files
            .iter()
            .any(|f| is_content_entry(&normalized(f), WP_CONTENT, false));
        has_database && has_content
    }

    fn parse_backup_contents(&self, files: &[String], extraction_directory: &Path) -> BackupContents {
        let mut contents =
            BackupContents::new(BackupProvider::Playground, extraction_directory, "wp-content");

        for file in files {
            let entry = normalized(file);
            let full_path = extracted_path(extraction_directory, file);

            if is_file_in(&entry, DATABASE_DIR, ".sqlite") {
                contents.sql_files.push(full_path);
            } else if let Some(relative) = entry.strip_prefix(WP_CONTENT) {
                bucket_content(&mut contents, relative, full_path);
            } else if entry == "wp-config.php" {
                contents.wp_config = full_path;
            } else if entry == "blueprint.json" {
                contents.meta_file = Some(full_path);
            }
        }

        contents.sort_sql_files();
        contents
    }
}

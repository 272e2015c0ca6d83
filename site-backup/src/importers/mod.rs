//! Backup importer: lands canonical backup contents in a site directory.
//!
//! The same algorithm serves every provider, since validators have already
//! normalized the source layout:
//! - copy `wp-content` buckets and `wp-config.php` (overwriting)
//! - move the database into place (SQLite file) or replay SQL dumps through
//!   the site runtime
//! - read advisory metadata (PHP / WordPress versions)
//! - rewrite the site URL when the imported one differs

mod meta;

pub use meta::{parse_meta_file, ImportMeta};

use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backup::{BackupContents, BackupProvider, SiteInfo};
use crate::events::{BackupEvent, EventSink};
use crate::fs::{move_file, remove_if_exists};
use crate::runtime::{run_checked, DatabaseCommand, SiteRuntime};
use crate::utils::errors::Result;

/// Table prefix placeholder used in All-in-One WP Migration dumps
const WPRESS_TABLE_PREFIX: &[u8] = b"SERVMASK_PREFIX_";
const SQLITE_DATABASE: &str = "wp-content/database/.ht.sqlite";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub provider: BackupProvider,
    pub meta: ImportMeta,
    pub content_files_copied: usize,
    pub wp_config_copied: bool,
    pub sql_files_imported: usize,
    pub site_url_rewritten: bool,
}

impl ImportResult {
    fn new(provider: BackupProvider) -> Self {
        Self {
            provider,
            meta: ImportMeta::default(),
            content_files_copied: 0,
            wp_config_copied: false,
            sql_files_imported: 0,
            site_url_rewritten: false,
        }
    }
}

pub struct BackupImporter {
    contents: BackupContents,
    runtime: Arc<dyn SiteRuntime>,
    events: EventSink,
    cancel_token: CancellationToken,
    copy_buffer_size: usize,
}

impl BackupImporter {
    pub fn new(contents: BackupContents, runtime: Arc<dyn SiteRuntime>) -> Self {
        Self {
            contents,
            runtime,
            events: EventSink::noop(),
            cancel_token: CancellationToken::new(),
            copy_buffer_size: 64 * 1024,
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancel(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    pub fn with_copy_buffer_size(mut self, copy_buffer_size: usize) -> Self {
        self.copy_buffer_size = copy_buffer_size;
        self
    }

    /// Import into `site`. Returns `None` when cancelled between phases.
    pub async fn import(&self, site: &SiteInfo) -> Result<Option<ImportResult>> {
        let site_path = site.path.as_path();
        let mut result = ImportResult::new(self.contents.provider);
        info!(
            provider = %self.contents.provider,
            site = %site_path.display(),
            "Importing backup contents"
        );

        self.events.emit(BackupEvent::ImportWpContentStart);
        result.content_files_copied = self.import_wp_content(site_path).await?;
        if self.contents.has_wp_config() {
            tokio::fs::copy(&self.contents.wp_config, site_path.join("wp-config.php")).await?;
            result.wp_config_copied = true;
        }
        self.events.emit(BackupEvent::ImportWpContentComplete);

        if self.cancel_token.is_cancelled() {
            return Ok(None);
        }

        if !self.contents.sql_files.is_empty() {
            self.events.emit(BackupEvent::ImportDatabaseStart);
            result.sql_files_imported = self.import_database(site_path).await?;
            self.events.emit(BackupEvent::ImportDatabaseComplete);

            if self.cancel_token.is_cancelled() {
                return Ok(None);
            }
        }

        if let Some(meta_file) = &self.contents.meta_file {
            self.events.emit(BackupEvent::ImportMetaStart);
            match parse_meta_file(self.contents.provider, meta_file).await {
                Ok(meta) => result.meta = meta,
                Err(e) => warn!("Ignoring backup metadata: {}", e),
            }
            self.events.emit(BackupEvent::ImportMetaComplete);
        }

        if result.sql_files_imported > 0 {
            result.site_url_rewritten = self.replace_site_url(site).await?;
        }

        info!(
            "Imported {} content files, {} database file(s)",
            result.content_files_copied, result.sql_files_imported
        );
        Ok(Some(result))
    }

    async fn import_wp_content(&self, site_path: &Path) -> Result<usize> {
        let wp_content = site_path.join("wp-content");
        let mut buckets = vec!["uploads", "plugins", "themes"];
        if self.contents.wp_content.mu_plugins.is_some() {
            buckets.push("mu-plugins");
        }
        for bucket in buckets {
            tokio::fs::create_dir_all(wp_content.join(bucket)).await?;
        }

        let source_root = self.contents.wp_content_root();
        let mut copied = 0;
        for file in self.contents.wp_content.all_files() {
            let Ok(relative) = file.strip_prefix(&source_root) else {
                warn!("Skipping {}: outside of wp-content", file.display());
                continue;
            };
            let target = wp_content.join(relative);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(file, &target).await?;
            copied += 1;
        }

        debug!("Copied {} files into {}", copied, wp_content.display());
        Ok(copied)
    }

    async fn import_database(&self, site_path: &Path) -> Result<usize> {
        if self.contents.provider == BackupProvider::Playground {
            return self.import_sqlite_database(site_path).await;
        }

        let timestamp = Utc::now().format("%Y%m%dT%H%M%S");
        let mut imported = 0;

        for (n, sql_file) in self.contents.sql_files.iter().enumerate() {
            let staged = site_path.join(format!("studio-backup-sql-import-{}-{}.sql", timestamp, n));

            let outcome = match self.stage_sql_file(sql_file, &staged).await {
                Ok(()) => run_checked(
                    self.runtime.as_ref(),
                    site_path,
                    DatabaseCommand::Import { file: staged.clone() },
                )
                .await
                .map(|_| ()),
                Err(e) => Err(e.into()),
            };

            if let Err(e) = remove_if_exists(&staged).await {
                warn!("Failed to remove {}: {}", staged.display(), e);
            }
            outcome?;

            debug!("Imported {}", sql_file.display());
            imported += 1;
        }

        Ok(imported)
    }

    async fn import_sqlite_database(&self, site_path: &Path) -> Result<usize> {
        let Some((database, rest)) = self.contents.sql_files.split_first() else {
            return Ok(0);
        };
        if !rest.is_empty() {
            warn!("Backup has {} extra SQLite files, using {}", rest.len(), database.display());
        }

        let target = site_path.join(SQLITE_DATABASE);
        move_file(database, &target).await?;
        Ok(1)
    }

    /// Move a dump next to the site, rewriting the table prefix placeholder for Wpress.
    async fn stage_sql_file(&self, source: &Path, staged: &Path) -> std::io::Result<()> {
        if self.contents.provider != BackupProvider::Wpress {
            return move_file(source, staged).await;
        }

        let mut reader = BufReader::with_capacity(self.copy_buffer_size, tokio::fs::File::open(source).await?);
        let mut writer = BufWriter::with_capacity(self.copy_buffer_size, tokio::fs::File::create(staged).await?);
        let mut line = Vec::new();
        let mut rewritten = Vec::new();

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            rewritten.clear();
            replace_table_prefix(&line, &mut rewritten);
            writer.write_all(&rewritten).await?;
        }
        writer.flush().await?;

        tokio::fs::remove_file(source).await
    }

    /// Point the imported database at the destination URL.
    async fn replace_site_url(&self, site: &SiteInfo) -> Result<bool> {
        let new_url = site.url.trim_end_matches('/');
        if new_url.is_empty() {
            return Ok(false);
        }

        let output = run_checked(
            self.runtime.as_ref(),
            &site.path,
            DatabaseCommand::GetOption {
                name: "siteurl".to_string(),
            },
        )
        .await?;
        let old_url = output.stdout.trim().trim_end_matches('/');
        if old_url.is_empty() || old_url == new_url {
            return Ok(false);
        }

        info!("Replacing site URL {} with {}", old_url, new_url);
        run_checked(
            self.runtime.as_ref(),
            &site.path,
            DatabaseCommand::SearchReplace {
                from: old_url.to_string(),
                to: new_url.to_string(),
            },
        )
        .await?;
        Ok(true)
    }
}

fn replace_table_prefix(line: &[u8], out: &mut Vec<u8>) {
    let mut rest = line;
    while let Some(pos) = rest
        .windows(WPRESS_TABLE_PREFIX.len())
        .position(|window| window == WPRESS_TABLE_PREFIX)
    {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(b"wp_");
        rest = &rest[pos + WPRESS_TABLE_PREFIX.len()..];
    }
    out.extend_from_slice(rest);
}

/// Files an import would write, relative to the site root. Used by `inspect`.
pub fn planned_site_paths(contents: &BackupContents) -> Vec<PathBuf> {
    let root = contents.wp_content_root();
    let mut paths: Vec<PathBuf> = contents
        .wp_content
        .all_files()
        .filter_map(|f| f.strip_prefix(&root).ok())
        .map(|relative| Path::new("wp-content").join(relative))
        .collect();
    if contents.has_wp_config() {
        paths.push(PathBuf::from("wp-config.php"));
    }
    if contents.provider == BackupProvider::Playground && !contents.sql_files.is_empty() {
        paths.push(PathBuf::from(SQLITE_DATABASE));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{kinds, recording_sink, MockRuntime};
    use crate::utils::errors::BackupError;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Jetpack-shaped contents with one file per bucket.
    fn jetpack_contents(extract: &Path) -> BackupContents {
        let mut contents = BackupContents::new(BackupProvider::Jetpack, extract, "wp-content");
        let files = [
            "wp-content/uploads/2024/a.jpg",
            "wp-content/plugins/hello/hello.php",
            "wp-content/themes/tt4/style.css",
            "wp-content/mu-plugins/loader.php",
        ];
        for file in files {
            write(&extract.join(file), file);
        }
        contents.wp_content.uploads = vec![extract.join(files[0])];
        contents.wp_content.plugins = vec![extract.join(files[1])];
        contents.wp_content.themes = vec![extract.join(files[2])];
        contents.wp_content.mu_plugins = Some(vec![extract.join(files[3])]);

        write(&extract.join("wp-config.php"), "<?php define('DB_NAME', 'x');");
        contents.wp_config = extract.join("wp-config.php");
        contents
    }

    fn site(path: &Path) -> SiteInfo {
        SiteInfo {
            id: "site-1".to_string(),
            path: path.to_path_buf(),
            url: "http://localhost:8881".to_string(),
        }
    }

    #[tokio::test]
    async fn test_copies_content_and_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let extract = temp_dir.path().join("extract");
        let site_dir = temp_dir.path().join("site");
        fs::create_dir_all(&site_dir)?;

        let runtime = Arc::new(MockRuntime::default());
        let (sink, events) = recording_sink();
        let importer = BackupImporter::new(jetpack_contents(&extract), runtime.clone()).with_events(sink);

        let result = importer.import(&site(&site_dir)).await?.unwrap();
        assert_eq!(result.content_files_copied, 4);
        assert!(result.wp_config_copied);
        assert_eq!(result.sql_files_imported, 0);
        assert!(runtime.commands().is_empty());

        assert_eq!(
            fs::read_to_string(site_dir.join("wp-content/plugins/hello/hello.php"))?,
            "wp-content/plugins/hello/hello.php"
        );
        assert!(site_dir.join("wp-content/mu-plugins/loader.php").exists());
        assert!(site_dir.join("wp-config.php").exists());
        assert_eq!(kinds(&events), vec!["import-wp-content-start", "import-wp-content-complete"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_reimport_overwrites() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let extract = temp_dir.path().join("extract");
        let site_dir = temp_dir.path().join("site");
        fs::create_dir_all(&site_dir)?;
        let runtime: Arc<dyn SiteRuntime> = Arc::new(MockRuntime::default());

        let contents = jetpack_contents(&extract);
        BackupImporter::new(contents.clone(), runtime.clone())
            .import(&site(&site_dir))
            .await?;
        BackupImporter::new(contents, runtime)
            .import(&site(&site_dir))
            .await?;

        let uploads: Vec<_> = fs::read_dir(site_dir.join("wp-content/uploads/2024"))?.collect();
        assert_eq!(uploads.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_sql_dumps_imported_in_order_and_cleaned_up() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let extract = temp_dir.path().join("extract");
        let site_dir = temp_dir.path().join("site");
        fs::create_dir_all(&site_dir)?;

        let mut contents = BackupContents::new(BackupProvider::Jetpack, &extract, "wp-content");
        write(&extract.join("sql/wp_options.sql"), "INSERT INTO wp_options;\n");
        write(&extract.join("sql/wp_posts.sql"), "INSERT INTO wp_posts;\n");
        contents.sql_files = vec![extract.join("sql/wp_options.sql"), extract.join("sql/wp_posts.sql")];

        let runtime = Arc::new(MockRuntime {
            site_url: "https://example.wordpress.com".to_string(),
            ..MockRuntime::default()
        });
        let result = BackupImporter::new(contents, runtime.clone())
            .import(&site(&site_dir))
            .await?
            .unwrap();

        assert_eq!(result.sql_files_imported, 2);
        assert!(result.site_url_rewritten);
        assert_eq!(
            *runtime.imported.lock().unwrap(),
            vec!["INSERT INTO wp_options;\n", "INSERT INTO wp_posts;\n"]
        );
        assert!(runtime.commands().contains(&DatabaseCommand::SearchReplace {
            from: "https://example.wordpress.com".to_string(),
            to: "http://localhost:8881".to_string(),
        }));

        let leftovers: Vec<_> = fs::read_dir(&site_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("studio-backup-sql-import-"))
            .collect();
        assert!(leftovers.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_sql_import_still_removes_staged_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let extract = temp_dir.path().join("extract");
        let site_dir = temp_dir.path().join("site");
        fs::create_dir_all(&site_dir)?;

        let mut contents = BackupContents::new(BackupProvider::Local, &extract, "app/public/wp-content");
        write(&extract.join("app/sql/local.sql"), "BROKEN");
        contents.sql_files = vec![extract.join("app/sql/local.sql")];

        let runtime = Arc::new(MockRuntime {
            fail_prefix: Some("import".to_string()),
            ..MockRuntime::default()
        });
        let err = BackupImporter::new(contents, runtime)
            .import(&site(&site_dir))
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::DatabaseToolFailure { .. }));
        assert_eq!(fs::read_dir(&site_dir)?.filter_map(|e| e.ok()).filter(|e| e.path().is_file()).count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_wpress_prefix_rewritten() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let extract = temp_dir.path().join("extract");
        let site_dir = temp_dir.path().join("site");
        fs::create_dir_all(&site_dir)?;

        let mut contents = BackupContents::new(BackupProvider::Wpress, &extract, "");
        write(
            &extract.join("database.sql"),
            "CREATE TABLE `SERVMASK_PREFIX_posts`;\nINSERT INTO `SERVMASK_PREFIX_options` VALUES ('SERVMASK_PREFIX_user_roles');\n",
        );
        contents.sql_files = vec![extract.join("database.sql")];

        let runtime = Arc::new(MockRuntime::default());
        BackupImporter::new(contents, runtime.clone())
            .import(&site(&site_dir))
            .await?;

        assert_eq!(
            runtime.imported.lock().unwrap()[0],
            "CREATE TABLE `wp_posts`;\nINSERT INTO `wp_options` VALUES ('wp_user_roles');\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_playground_database_moved_with_overwrite() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let extract = temp_dir.path().join("extract");
        let site_dir = temp_dir.path().join("site");
        write(&site_dir.join(SQLITE_DATABASE), "old database");

        let mut contents = BackupContents::new(BackupProvider::Playground, &extract, "wp-content");
        write(&extract.join("wp-content/database/.ht.sqlite"), "new database");
        contents.sql_files = vec![extract.join("wp-content/database/.ht.sqlite")];

        let runtime = Arc::new(MockRuntime::default());
        let result = BackupImporter::new(contents, runtime.clone())
            .import(&site(&site_dir))
            .await?
            .unwrap();

        assert_eq!(result.sql_files_imported, 1);
        assert_eq!(fs::read_to_string(site_dir.join(SQLITE_DATABASE))?, "new database");
        assert!(!extract.join("wp-content/database/.ht.sqlite").exists());
        assert!(!runtime
            .commands()
            .iter()
            .any(|c| matches!(c, DatabaseCommand::Import { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_meta_is_not_fatal() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let extract = temp_dir.path().join("extract");
        let site_dir = temp_dir.path().join("site");
        fs::create_dir_all(&site_dir)?;

        let mut contents = BackupContents::new(BackupProvider::Local, &extract, "app/public/wp-content");
        write(&extract.join("local-site.json"), "{ broken");
        contents.meta_file = Some(extract.join("local-site.json"));

        let result = BackupImporter::new(contents, Arc::new(MockRuntime::default()))
            .import(&site(&site_dir))
            .await?
            .unwrap();
        assert_eq!(result.meta, ImportMeta::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_cancelled_before_database() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let extract = temp_dir.path().join("extract");
        let site_dir = temp_dir.path().join("site");
        fs::create_dir_all(&site_dir)?;

        let mut contents = BackupContents::new(BackupProvider::Jetpack, &extract, "wp-content");
        write(&extract.join("sql/a.sql"), "--");
        contents.sql_files = vec![extract.join("sql/a.sql")];

        let cancel = CancellationToken::new();
        cancel.cancel();
        let runtime = Arc::new(MockRuntime::default());
        let result = BackupImporter::new(contents, runtime.clone())
            .with_cancel(cancel)
            .import(&site(&site_dir))
            .await?;
        assert!(result.is_none());
        assert!(runtime.commands().is_empty());
        Ok(())
    }

    #[test]
    fn test_replace_table_prefix() {
        let mut out = Vec::new();
        replace_table_prefix(b"DROP TABLE SERVMASK_PREFIX_a, SERVMASK_PREFIX_b;\n", &mut out);
        assert_eq!(out, b"DROP TABLE wp_a, wp_b;\n");

        out.clear();
        replace_table_prefix(b"\xff binary \x00 row\n", &mut out);
        assert_eq!(out, b"\xff binary \x00 row\n");
    }

    #[test]
    fn test_planned_site_paths() {
        let extract = Path::new("/tmp/extract");
        let mut contents = BackupContents::new(BackupProvider::Wpress, extract, "");
        contents.wp_content.uploads = vec![extract.join("uploads/a.jpg")];
        assert_eq!(planned_site_paths(&contents), vec![PathBuf::from("wp-content/uploads/a.jpg")]);
    }
}

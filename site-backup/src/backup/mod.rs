//! Provider-agnostic description of a backup archive and its contents.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A single input archive on disk, as chosen by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupArchiveInfo {
    pub path: PathBuf,
    /// MIME type reported by the caller (informational; dispatch is by extension)
    #[serde(rename = "type", default)]
    pub mime_type: String,
}

impl BackupArchiveInfo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime_type = mime_for_path(&path).to_string();
        Self { path, mime_type }
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if name.ends_with(".zip") {
        "application/zip"
    } else if name.ends_with(".tar.gz") || name.ends_with(".gz") {
        "application/gzip"
    } else if name.ends_with(".sql") {
        "application/sql"
    } else {
        "application/octet-stream"
    }
}

/// A site known to the caller: the target of an import or the source of an export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteInfo {
    pub id: String,
    /// Site root; empty means "ask the site runtime"
    pub path: PathBuf,
    /// Public URL of the site, e.g. `http://localhost:8881`
    #[serde(default)]
    pub url: String,
}

/// Which backup convention an archive follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupProvider {
    Jetpack,
    Local,
    Playground,
    Wpress,
    Sql,
}

impl fmt::Display for BackupProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackupProvider::Jetpack => "jetpack",
            BackupProvider::Local => "local",
            BackupProvider::Playground => "playground",
            BackupProvider::Wpress => "wpress",
            BackupProvider::Sql => "sql",
        };
        f.write_str(name)
    }
}

/// Content files bucketed by their role inside `wp-content`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WpContent {
    pub uploads: Vec<PathBuf>,
    pub plugins: Vec<PathBuf>,
    pub themes: Vec<PathBuf>,
    /// None for providers that have no mu-plugins bucket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mu_plugins: Option<Vec<PathBuf>>,
}

impl WpContent {
    /// Every content file, in bucket order.
    pub fn all_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.uploads
            .iter()
            .chain(self.plugins.iter())
            .chain(self.themes.iter())
            .chain(self.mu_plugins.iter().flatten())
    }

    pub fn len(&self) -> usize {
        self.all_files().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Canonical backup description produced by a validator.
///
/// Every path is absolute and lies under `extraction_directory`, except
/// `wp_config` which is empty when the backup has no configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupContents {
    pub provider: BackupProvider,
    pub extraction_directory: PathBuf,
    /// Sorted by file name
    pub sql_files: Vec<PathBuf>,
    pub wp_config: PathBuf,
    pub wp_content: WpContent,
    /// Root of `wp-content` inside the archive, relative
    pub wp_content_directory: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_file: Option<PathBuf>,
}

impl BackupContents {
    pub fn new(
        provider: BackupProvider,
        extraction_directory: &Path,
        wp_content_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            extraction_directory: extraction_directory.to_path_buf(),
            sql_files: Vec::new(),
            wp_config: PathBuf::new(),
            wp_content: WpContent::default(),
            wp_content_directory: wp_content_directory.into(),
            meta_file: None,
        }
    }

    pub fn has_wp_config(&self) -> bool {
        !self.wp_config.as_os_str().is_empty()
    }

    /// Sort `sql_files` by file name so multi-file dumps replay deterministically.
    pub fn sort_sql_files(&mut self) {
        self.sql_files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    }

    /// Absolute root of `wp-content` inside the extraction directory.
    pub fn wp_content_root(&self) -> PathBuf {
        self.extraction_directory.join(&self.wp_content_directory)
    }
}

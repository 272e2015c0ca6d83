//! Backup validators: recognize a provider from an archive's entry list and
//! describe its contents canonically.
//!
//! Validators are evaluated in a fixed order (Jetpack, Local, Playground,
//! Wpress, Sql) and the first match wins, so overlapping signatures resolve
//! deterministically.

mod jetpack;
mod local;
mod playground;
mod sql;
mod wpress;

pub use jetpack::JetpackValidator;
pub use local::LocalValidator;
pub use playground::PlaygroundValidator;
pub use sql::SqlValidator;
pub use wpress::WpressValidator;

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::backup::{BackupContents, BackupProvider};
use crate::handlers::entry_path;

pub trait BackupValidator: Send + Sync {
    fn provider(&self) -> BackupProvider;

    fn can_handle(&self, files: &[String]) -> bool;

    /// Bucket `files` into canonical contents rooted at `extraction_directory`.
    ///
    /// Only meaningful when [`BackupValidator::can_handle`] returned true.
    fn parse_backup_contents(&self, files: &[String], extraction_directory: &Path) -> BackupContents;
}

/// All validators in selection order.
pub fn default_validators() -> Vec<Box<dyn BackupValidator>> {
    vec![
        Box::new(JetpackValidator),
        Box::new(LocalValidator),
        Box::new(PlaygroundValidator),
        Box::new(WpressValidator),
        Box::new(SqlValidator),
    ]
}

/// First validator that claims `files`.
pub fn select_validator<'a>(
    validators: &'a [Box<dyn BackupValidator>],
    files: &[String],
) -> Option<&'a dyn BackupValidator> {
    validators
        .iter()
        .find(|v| v.can_handle(files))
        .map(|v| v.as_ref())
}

/// Entry path with `\` folded to `/`, so Windows-made archives match the same prefixes.
pub(crate) fn normalized(entry: &str) -> Cow<'_, str> {
    if entry.contains('\\') {
        Cow::Owned(entry.replace('\\', "/"))
    } else {
        Cow::Borrowed(entry)
    }
}

/// Where a listed entry lands below `extraction_directory`, matching what the handlers extract.
pub(crate) fn extracted_path(extraction_directory: &Path, entry: &str) -> PathBuf {
    match entry_path(entry) {
        Some(relative) => extraction_directory.join(relative),
        None => extraction_directory.join(entry),
    }
}

/// Content roles found directly below `wp-content`.
const CONTENT_ROLES: [&str; 4] = ["uploads/", "plugins/", "themes/", "mu-plugins/"];

/// Whether `entry` lies in one of the content buckets below `wp_content_prefix`.
pub(crate) fn is_content_entry(entry: &str, wp_content_prefix: &str, with_mu_plugins: bool) -> bool {
    let Some(rest) = entry.strip_prefix(wp_content_prefix) else {
        return false;
    };
    CONTENT_ROLES
        .iter()
        .filter(|role| with_mu_plugins || **role != "mu-plugins/")
        .any(|role| rest.starts_with(role))
}

/// Put `path` into the bucket named by the start of `relative` (a path relative to `wp-content`).
///
/// Returns false when `relative` is not in a known bucket.
pub(crate) fn bucket_content(contents: &mut BackupContents, relative: &str, path: PathBuf) -> bool {
    let content = &mut contents.wp_content;
    if relative.starts_with("uploads/") {
        content.uploads.push(path);
    } else if relative.starts_with("plugins/") {
        content.plugins.push(path);
    } else if relative.starts_with("themes/") {
        content.themes.push(path);
    } else if relative.starts_with("mu-plugins/") {
        match content.mu_plugins.as_mut() {
            Some(mu_plugins) => mu_plugins.push(path),
            None => return false,
        }
    } else {
        return false;
    }
    true
}

/// `dir/*.ext` with no further nesting below `dir`.
pub(crate) fn is_file_in(entry: &str, dir: &str, extension: &str) -> bool {
    entry
        .strip_prefix(dir)
        .is_some_and(|name| !name.contains('/') && name.len() > extension.len() && name.ends_with(extension))
}

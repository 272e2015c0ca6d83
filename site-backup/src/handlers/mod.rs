//! Archive handlers: list and extract the entries of a single backup archive.
//!
//! Handlers are blocking; callers run them on `spawn_blocking`.

mod sql;
mod tar_gz;
mod zip;

pub use self::sql::SqlHandler;
pub use self::tar_gz::TarGzHandler;
pub use self::zip::ZipHandler;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::events::{BackupEvent, EventSink};
use crate::utils::errors::Result;

pub trait ArchiveHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Entry paths that pass [`is_allowed_entry`], in archive order.
    fn list_files(&self, archive: &Path) -> Result<Vec<String>>;

    /// Extract every allowed entry below `destination`.
    ///
    /// Emits `extract-start`, `extract-progress`, then `extract-complete`, or
    /// `extract-error` when a stream fails.
    fn extract_files(&self, archive: &Path, destination: &Path, events: &EventSink) -> Result<()>;
}

/// Pick a handler by file extension; `None` means the format is unsupported.
pub fn handler_for(archive: &Path) -> Option<Arc<dyn ArchiveHandler>> {
    let name = archive.file_name()?.to_string_lossy().to_ascii_lowercase();

    if name.ends_with(".zip") {
        Some(Arc::new(ZipHandler))
    } else if name.ends_with(".tar.gz") || name.ends_with(".gz") || name.ends_with(".wpress") {
        Some(Arc::new(TarGzHandler))
    } else if name.ends_with(".sql") {
        Some(Arc::new(SqlHandler))
    } else {
        None
    }
}

/// Whether an archive entry takes part in listing and extraction.
///
/// Hidden paths, macOS resource forks and bare directory markers are skipped.
pub fn is_allowed_entry(entry: &str) -> bool {
    !entry.is_empty()
        && !entry.starts_with('.')
        && !entry.starts_with("__MACOSX/")
        && !entry.starts_with("__MACOSX\\")
        && !entry.ends_with('/')
        && !entry.ends_with('\\')
}

/// Relative path an entry unpacks to, splitting on both `/` and `\`.
///
/// `None` for absolute entries and entries with `..` components; those are
/// neither listed nor extracted.
pub fn entry_path(entry: &str) -> Option<PathBuf> {
    if entry.starts_with(['/', '\\']) {
        return None;
    }
    let mut path = PathBuf::new();
    for component in entry.split(['/', '\\']) {
        match component {
            "" | "." => {}
            ".." => return None,
            _ => path.push(component),
        }
    }
    (!path.as_os_str().is_empty()).then_some(path)
}

/// Wrap one extraction pass with start/complete/error events.
pub(crate) fn with_extraction_events<F>(events: &EventSink, extract: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    events.emit(BackupEvent::ExtractStart);
    match extract() {
        Ok(()) => {
            events.emit(BackupEvent::ExtractComplete);
            Ok(())
        }
        Err(e) => {
            events.emit(BackupEvent::ExtractError {
                error: e.to_string(),
            });
            Err(e)
        }
    }
}

pub(crate) fn progress_callback(events: &EventSink) -> crate::progress::FractionCallback {
    let events = events.clone();
    Box::new(move |progress| events.emit(BackupEvent::ExtractProgress { progress }))
}

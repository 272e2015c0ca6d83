//! Phase events emitted while importing or exporting a backup.
//!
//! Events are observational: a sink must not feed back into the pipeline.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::backup::BackupProvider;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BackupEvent {
    ImportStart,
    ValidationStart,
    ValidationComplete { provider: BackupProvider },
    ExtractStart,
    /// Fraction of archive bytes processed, 0.0..=1.0
    ExtractProgress { progress: f64 },
    ExtractComplete,
    ExtractError { error: String },
    ImportDatabaseStart,
    ImportDatabaseComplete,
    ImportWpContentStart,
    ImportWpContentComplete,
    ImportMetaStart,
    ImportMetaComplete,
    ImportComplete,

    ExportStart,
    ExportDatabaseStart,
    ExportDatabaseComplete,
    /// Fraction of source bytes written to the archive, 0.0..=1.0
    ArchiveProgress { progress: f64 },
    ExportComplete,
}

impl BackupEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            BackupEvent::ImportStart => "import-start",
            BackupEvent::ValidationStart => "validation-start",
            BackupEvent::ValidationComplete { .. } => "validation-complete",
            BackupEvent::ExtractStart => "extract-start",
            BackupEvent::ExtractProgress { .. } => "extract-progress",
            BackupEvent::ExtractComplete => "extract-complete",
            BackupEvent::ExtractError { .. } => "extract-error",
            BackupEvent::ImportDatabaseStart => "import-database-start",
            BackupEvent::ImportDatabaseComplete => "import-database-complete",
            BackupEvent::ImportWpContentStart => "import-wp-content-start",
            BackupEvent::ImportWpContentComplete => "import-wp-content-complete",
            BackupEvent::ImportMetaStart => "import-meta-start",
            BackupEvent::ImportMetaComplete => "import-meta-complete",
            BackupEvent::ImportComplete => "import-complete",
            BackupEvent::ExportStart => "export-start",
            BackupEvent::ExportDatabaseStart => "export-database-start",
            BackupEvent::ExportDatabaseComplete => "export-database-complete",
            BackupEvent::ArchiveProgress { .. } => "archive-progress",
            BackupEvent::ExportComplete => "export-complete",
        }
    }
}

/// Callback for pipeline events
pub type EventCallback = Arc<dyn Fn(BackupEvent) + Send + Sync>;

/// Destination for pipeline events, threaded explicitly through every phase.
///
/// Cloning is cheap; events may be emitted from blocking worker threads.
#[derive(Clone)]
pub struct EventSink {
    callback: EventCallback,
}

impl EventSink {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(BackupEvent) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// A sink that drops every event
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// A sink backed by an unbounded channel; events are dropped once the receiver is gone
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BackupEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self::new(move |event| {
            let _ = tx.send(event);
        });
        (sink, rx)
    }

    pub fn emit(&self, event: BackupEvent) {
        (self.callback)(event);
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

//! Site Backup Library
//!
//! Import and export of WordPress sites from Jetpack, Local, Playground and
//! `.wpress` backups, plus bare SQL dumps.

pub mod backup;
pub mod config;
pub mod events;
pub mod exporters;
pub mod fs;
pub mod handlers;
pub mod importers;
pub mod manager;
pub mod progress;
pub mod runtime;
pub mod utils;
pub mod validators;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types
pub use backup::{BackupArchiveInfo, BackupContents, BackupProvider, SiteInfo};
pub use config::Config;
pub use events::{BackupEvent, EventSink};
pub use manager::{DestinationSite, ImportExportManager, ImportOptions};
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;

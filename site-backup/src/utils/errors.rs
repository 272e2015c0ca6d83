//! Custom error types for the backup pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Unsupported archive format: {}", .0.display())]
    UnsupportedArchiveFormat(PathBuf),

    #[error("Unrecognized backup provider for archive: {}", .0.display())]
    UnrecognizedBackupProvider(PathBuf),

    #[error("Extraction failed for {}: {source}", path.display())]
    ExtractionFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database command `{command}` failed (exit code {exit_code:?}): {stderr}")]
    DatabaseToolFailure {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to parse metadata file {}: {reason}", path.display())]
    MetadataParse { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Site runtime error: {0}")]
    Runtime(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl BackupError {
    /// Wrap a stream failure from an archive read or write.
    pub fn extraction(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        BackupError::ExtractionFailure {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Stable machine-readable kind, used by callers that render their own messages.
    pub fn kind(&self) -> &'static str {
        match self {
            BackupError::UnsupportedArchiveFormat(_) => "unsupported-archive-format",
            BackupError::UnrecognizedBackupProvider(_) => "unrecognized-backup-provider",
            BackupError::ExtractionFailure { .. } => "extraction-failure",
            BackupError::DatabaseToolFailure { .. } => "database-tool-failure",
            BackupError::MetadataParse { .. } => "metadata-parse-failure",
            BackupError::Config(_) => "config",
            BackupError::Runtime(_) => "runtime",
            BackupError::Io(_) => "io",
            BackupError::Serialization(_) => "serialization",
            BackupError::Join(_) => "join",
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;

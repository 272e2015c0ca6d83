//! Boundary to the process that runs database commands against a site.
//!
//! The pipeline never executes SQL itself; it hands typed commands to a
//! [`SiteRuntime`] and checks the output.

mod wp_cli;

pub use wp_cli::WpCliRuntime;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::utils::errors::{BackupError, Result};

/// A database operation understood by the site runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseCommand {
    /// Replay a SQL dump into the site database
    Import { file: PathBuf },
    /// Dump the database (or only `tables`, when non-empty) to `file`
    Export { file: PathBuf, tables: Vec<String> },
    /// Table names as a JSON array on stdout
    ListTables,
    /// Value of a WordPress option on stdout
    GetOption { name: String },
    /// Replace `from` with `to` across all tables
    SearchReplace { from: String, to: String },
}

impl fmt::Display for DatabaseCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseCommand::Import { file } => write!(f, "import {}", file.display()),
            DatabaseCommand::Export { file, tables } if tables.is_empty() => {
                write!(f, "export {}", file.display())
            }
            DatabaseCommand::Export { file, tables } => {
                write!(f, "export {} ({})", file.display(), tables.join(","))
            }
            DatabaseCommand::ListTables => f.write_str("tables"),
            DatabaseCommand::GetOption { name } => write!(f, "option get {}", name),
            DatabaseCommand::SearchReplace { from, to } => write!(f, "search-replace {} {}", from, to),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// None when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// Non-zero exit or any stderr output is a [`BackupError::DatabaseToolFailure`].
    pub fn check(self, command: &DatabaseCommand) -> Result<Self> {
        if self.exit_code == Some(0) && self.stderr.trim().is_empty() {
            return Ok(self);
        }
        Err(BackupError::DatabaseToolFailure {
            command: command.to_string(),
            exit_code: self.exit_code,
            stderr: self.stderr.trim().to_string(),
        })
    }
}

#[async_trait]
pub trait SiteRuntime: Send + Sync {
    /// Run `command` in the context of the site rooted at `site_path`.
    ///
    /// Returns the raw output; callers decide whether to [`CommandOutput::check`] it.
    async fn execute_database_command(
        &self,
        site_path: &Path,
        command: DatabaseCommand,
    ) -> Result<CommandOutput>;

    /// Directory of a known site.
    async fn site_path(&self, site_id: &str) -> Option<PathBuf>;

    async fn is_site_running(&self, site_id: &str) -> bool;
}

/// Execute `command` and fail on any tool error.
pub async fn run_checked(
    runtime: &dyn SiteRuntime,
    site_path: &Path,
    command: DatabaseCommand,
) -> Result<CommandOutput> {
    let output = runtime
        .execute_database_command(site_path, command.clone())
        .await?;
    output.check(&command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_accepts_clean_output() {
        let output = CommandOutput::success("[]");
        assert!(output.check(&DatabaseCommand::ListTables).is_ok());
    }

    #[test]
    fn test_check_rejects_stderr_even_on_zero_exit() {
        let output = CommandOutput {
            stdout: String::new(),
            stderr: "Warning: table missing\n".to_string(),
            exit_code: Some(0),
        };
        let err = output.check(&DatabaseCommand::ListTables).unwrap_err();
        match err {
            BackupError::DatabaseToolFailure { command, exit_code, stderr } => {
                assert_eq!(command, "tables");
                assert_eq!(exit_code, Some(0));
                assert_eq!(stderr, "Warning: table missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_check_rejects_nonzero_exit() {
        let output = CommandOutput {
            exit_code: Some(1),
            ..CommandOutput::default()
        };
        let command = DatabaseCommand::Import {
            file: PathBuf::from("/site/dump.sql"),
        };
        let err = output.check(&command).unwrap_err();
        assert_eq!(err.kind(), "database-tool-failure");
        assert!(err.to_string().contains("import /site/dump.sql"));
    }
}

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{CommandOutput, DatabaseCommand, SiteRuntime};
use crate::config::{DatabaseDriver, RuntimeConfig};
use crate::utils::errors::{BackupError, Result};

/// Runs database commands through WP-CLI in the site directory.
///
/// SQLite sites go through the `wp sqlite` command family, MySQL sites
/// through `wp db`. WP-CLI works on the files directly, so there is no
/// server process whose state could be observed.
pub struct WpCliRuntime {
    config: RuntimeConfig,
    sites: HashMap<String, PathBuf>,
}

impl WpCliRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            sites: HashMap::new(),
        }
    }

    /// Register a site so it can be found by id.
    pub fn with_site(mut self, site_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.sites.insert(site_id.into(), path.into());
        self
    }

    fn arguments(&self, command: &DatabaseCommand) -> Vec<String> {
        let family = match self.config.database_driver {
            DatabaseDriver::Sqlite => "sqlite",
            DatabaseDriver::Mysql => "db",
        };

        let mut args: Vec<String> = match command {
            DatabaseCommand::Import { file } => {
                vec![family.into(), "import".into(), file.display().to_string()]
            }
            DatabaseCommand::Export { file, tables } => {
                let mut args = vec![family.into(), "export".into(), file.display().to_string()];
                if !tables.is_empty() {
                    args.push(format!("--tables={}", tables.join(",")));
                }
                args
            }
            DatabaseCommand::ListTables => match self.config.database_driver {
                DatabaseDriver::Sqlite => vec!["sqlite".into(), "tables".into(), "--format=json".into()],
                // `wp db tables` has no json format
                DatabaseDriver::Mysql => vec!["db".into(), "tables".into(), "--format=csv".into()],
            },
            DatabaseCommand::GetOption { name } => vec!["option".into(), "get".into(), name.clone()],
            DatabaseCommand::SearchReplace { from, to } => vec![
                "search-replace".into(),
                from.clone(),
                to.clone(),
                "--all-tables".into(),
            ],
        };

        args.extend(self.config.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl SiteRuntime for WpCliRuntime {
    async fn execute_database_command(
        &self,
        site_path: &Path,
        command: DatabaseCommand,
    ) -> Result<CommandOutput> {
        let args = self.arguments(&command);
        debug!(site = %site_path.display(), "{} {}", self.config.wp_cli, args.join(" "));

        let output = Command::new(&self.config.wp_cli)
            .args(&args)
            .current_dir(site_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| BackupError::Runtime(format!("failed to run {}: {}", self.config.wp_cli, e)))?;

        let mut result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };

        if command == DatabaseCommand::ListTables
            && self.config.database_driver == DatabaseDriver::Mysql
            && result.exit_code == Some(0)
        {
            result.stdout = csv_tables_to_json(&result.stdout)?;
        }

        Ok(result)
    }

    async fn site_path(&self, site_id: &str) -> Option<PathBuf> {
        self.sites.get(site_id).cloned()
    }

    async fn is_site_running(&self, _site_id: &str) -> bool {
        false
    }
}

fn csv_tables_to_json(stdout: &str) -> Result<String> {
    let tables: Vec<&str> = stdout
        .split([',', '\n'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    Ok(serde_json::to_string(&tables)?)
}

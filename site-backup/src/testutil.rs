//! Fixtures shared by the unit tests.

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::events::{BackupEvent, EventSink};
use crate::runtime::{CommandOutput, DatabaseCommand, SiteRuntime};
use crate::utils::errors::Result;

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Write a zip archive with the given file entries (no directory entries).
pub(crate) fn write_zip(path: &Path, entries: &[(&str, &str)]) -> io::Result<()> {
    let mut zip = zip::ZipWriter::new(File::create(path)?);
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(content.as_bytes())?;
    }
    zip.finish()?;
    Ok(())
}

/// Write a gzip-compressed tarball with the given file entries.
pub(crate) fn write_tar_gz(path: &Path, entries: &[(&str, &str)]) -> io::Result<()> {
    let encoder = GzEncoder::new(File::create(path)?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, content.as_bytes())?;
    }
    builder.into_inner()?.finish()?;
    Ok(())
}

/// Event sink that records every event for later assertions.
pub(crate) fn recording_sink() -> (EventSink, std::sync::Arc<Mutex<Vec<BackupEvent>>>) {
    let events = std::sync::Arc::new(Mutex::new(Vec::new()));
    let recorded = events.clone();
    let sink = EventSink::new(move |event| recorded.lock().unwrap().push(event));
    (sink, events)
}

pub(crate) fn kinds(events: &Mutex<Vec<BackupEvent>>) -> Vec<&'static str> {
    events.lock().unwrap().iter().map(|e| e.kind()).collect()
}

/// In-memory site runtime that records commands.
///
/// `Export` writes a small dump to the requested file, `Import` captures the
/// dump contents, and `GetOption` answers with `site_url`.
#[derive(Default)]
pub(crate) struct MockRuntime {
    pub tables_json: String,
    pub site_url: String,
    pub running: bool,
    /// Commands whose display form starts with this prefix fail with stderr output
    pub fail_prefix: Option<String>,
    pub commands: Mutex<Vec<DatabaseCommand>>,
    pub imported: Mutex<Vec<String>>,
    pub sites: Vec<(String, PathBuf)>,
}

impl MockRuntime {
    pub fn with_tables(tables: &[&str]) -> Self {
        Self {
            tables_json: serde_json::to_string(tables).unwrap(),
            ..Self::default()
        }
    }

    pub fn commands(&self) -> Vec<DatabaseCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn exported_files(&self) -> Vec<PathBuf> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                DatabaseCommand::Export { file, .. } => Some(file),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SiteRuntime for MockRuntime {
    async fn execute_database_command(
        &self,
        _site_path: &Path,
        command: DatabaseCommand,
    ) -> Result<CommandOutput> {
        self.commands.lock().unwrap().push(command.clone());

        if let Some(prefix) = &self.fail_prefix {
            if command.to_string().starts_with(prefix.as_str()) {
                return Ok(CommandOutput {
                    stdout: String::new(),
                    stderr: format!("Error: {} failed", prefix),
                    exit_code: Some(1),
                });
            }
        }

        let output = match command {
            DatabaseCommand::Import { file } => {
                let dump = std::fs::read_to_string(&file)?;
                self.imported.lock().unwrap().push(dump);
                CommandOutput::success("Success: Imported")
            }
            DatabaseCommand::Export { file, tables } => {
                let mut names = tables;
                names.sort();
                std::fs::write(&file, format!("-- dump {}\n", names.join(",")))?;
                CommandOutput::success("")
            }
            DatabaseCommand::ListTables => CommandOutput::success(self.tables_json.clone()),
            DatabaseCommand::GetOption { .. } => CommandOutput::success(format!("{}\n", self.site_url)),
            DatabaseCommand::SearchReplace { .. } => CommandOutput::success("Success: Made 3 replacements."),
        };
        Ok(output)
    }

    async fn site_path(&self, site_id: &str) -> Option<PathBuf> {
        self.sites
            .iter()
            .find(|(id, _)| id == site_id)
            .map(|(_, path)| path.clone())
    }

    async fn is_site_running(&self, _site_id: &str) -> bool {
        self.running
    }
}

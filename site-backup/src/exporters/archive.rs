use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{destination_name, export_database, export_tables, BackupExporter, ExportIncludes, ExportOptions};
use crate::events::{BackupEvent, EventSink};
use crate::fs::walker::{total_size, walk_directory, WalkOptions};
use crate::progress::{format_bytes, ByteProgress, ProgressReader};
use crate::runtime::SiteRuntime;
use crate::utils::errors::{BackupError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    fn for_options(options: &ExportOptions) -> Option<Self> {
        let name = destination_name(options);
        if name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
struct ArchiveEntry {
    source: PathBuf,
    /// Path inside the archive, always `/`-separated
    name: String,
    size: u64,
}

/// Full-site export to a zip or tar.gz archive.
///
/// The layout is the Jetpack one (`sql/`, `wp-content/`, `wp-config.php`,
/// `meta.json`), so the archive can be imported again.
pub struct ArchiveExporter {
    runtime: Arc<dyn SiteRuntime>,
    compression_level: u32,
    scratch_root: PathBuf,
}

impl ArchiveExporter {
    pub fn new(runtime: Arc<dyn SiteRuntime>, compression_level: u32, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            compression_level,
            scratch_root: scratch_root.into(),
        }
    }
}

#[async_trait]
impl BackupExporter for ArchiveExporter {
    fn name(&self) -> &'static str {
        "archive"
    }

    fn can_handle(&self, options: &ExportOptions) -> bool {
        ArchiveFormat::for_options(options).is_some()
    }

    async fn export(&self, options: &ExportOptions, events: &EventSink) -> Result<()> {
        let format = ArchiveFormat::for_options(options)
            .ok_or_else(|| BackupError::UnsupportedArchiveFormat(options.backup_file.clone()))?;
        let site_path = options.site.path.clone();

        tokio::fs::create_dir_all(&self.scratch_root).await?;
        let scratch = tempfile::Builder::new()
            .prefix("site-backup-export-")
            .tempdir_in(&self.scratch_root)?;

        let includes = options.includes;
        let walk_root = site_path.clone();
        let mut entries =
            tokio::task::spawn_blocking(move || collect_site_entries(&walk_root, &includes)).await??;

        if options.includes.database {
            events.emit(BackupEvent::ExportDatabaseStart);
            let sql_dir = scratch.path().join("sql");
            let dumps = if options.split_database_dump_by_table {
                export_tables(self.runtime.as_ref(), &site_path, &sql_dir).await?
            } else {
                tokio::fs::create_dir_all(&sql_dir).await?;
                let dump = sql_dir.join("database.sql");
                export_database(self.runtime.as_ref(), &site_path, &dump).await?;
                vec![dump]
            };
            for dump in dumps {
                let name = format!("sql/{}", dump.file_name().unwrap_or_default().to_string_lossy());
                entries.push(entry_for(dump, name)?);
            }
            events.emit(BackupEvent::ExportDatabaseComplete);
        }

        let meta = serde_json::json!({
            "phpVersion": options.php_version,
            "wordpressVersion": wordpress_version(&site_path),
        });
        let meta_path = scratch.path().join("meta.json");
        tokio::fs::write(&meta_path, serde_json::to_vec_pretty(&meta)?).await?;
        entries.push(entry_for(meta_path, "meta.json".to_string())?);

        if let Some(parent) = options.backup_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let destination = options.backup_file.clone();
        let level = self.compression_level;
        let events = events.clone();
        tokio::task::spawn_blocking(move || write_archive(format, &destination, &entries, level, &events))
            .await??;

        if let Err(e) = scratch.close() {
            warn!("Failed to remove export scratch directory: {}", e);
        }
        info!("Exported site to {}", options.backup_file.display());
        Ok(())
    }
}

fn entry_for(source: PathBuf, name: String) -> io::Result<ArchiveEntry> {
    let size = std::fs::metadata(&source)?.len();
    Ok(ArchiveEntry { source, name, size })
}

/// `wp-config.php` plus the included `wp-content` buckets. The SQLite
/// database directory is never archived; the dump replaces it.
fn collect_site_entries(site_path: &Path, includes: &ExportIncludes) -> io::Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();

    let wp_config = site_path.join("wp-config.php");
    if wp_config.is_file() {
        entries.push(entry_for(wp_config, "wp-config.php".to_string())?);
    }

    let mut options = WalkOptions::default();
    options.exclude_prefixes.push(PathBuf::from("database"));
    let buckets = [
        ("uploads", includes.uploads),
        ("plugins", includes.plugins),
        ("mu-plugins", includes.plugins),
        ("themes", includes.themes),
    ];
    for (bucket, included) in buckets {
        if !included {
            options.exclude_prefixes.push(PathBuf::from(bucket));
        }
    }

    let files = walk_directory(&site_path.join("wp-content"), &options)?;
    debug!("wp-content: {} files, {}", files.len(), format_bytes(total_size(&files)));
    for file in files {
        entries.push(ArchiveEntry {
            name: format!("wp-content/{}", archive_name(&file.relative_path)),
            source: file.path,
            size: file.size,
        });
    }

    Ok(entries)
}

fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// `$wp_version` from `wp-includes/version.php`, if present.
fn wordpress_version(site_path: &Path) -> Option<String> {
    let source = std::fs::read_to_string(site_path.join("wp-includes/version.php")).ok()?;
    source.lines().find_map(|line| {
        let rest = line.trim_start().strip_prefix("$wp_version")?;
        let start = rest.find(['\'', '"'])? + 1;
        let end = start + rest[start..].find(['\'', '"'])?;
        Some(rest[start..end].to_string())
    })
}

fn write_archive(
    format: ArchiveFormat,
    destination: &Path,
    entries: &[ArchiveEntry],
    level: u32,
    events: &EventSink,
) -> Result<()> {
    let total: u64 = entries.iter().map(|e| e.size).sum();
    info!(
        "Writing {} entries ({}) to {}",
        entries.len(),
        format_bytes(total),
        destination.display()
    );

    let callback_events = events.clone();
    let mut progress = ByteProgress::new(
        total,
        Box::new(move |progress| callback_events.emit(BackupEvent::ArchiveProgress { progress })),
    );

    let writer = BufWriter::new(File::create(destination)?);
    match format {
        ArchiveFormat::Zip => write_zip(writer, entries, level, &mut progress)?,
        ArchiveFormat::TarGz => write_tar_gz(writer, entries, level, &mut progress)?,
    }

    progress.finish();
    Ok(())
}

fn write_zip<W: Write + Seek>(
    writer: W,
    entries: &[ArchiveEntry],
    level: u32,
    progress: &mut ByteProgress,
) -> io::Result<()> {
    let mut zip = ZipWriter::new(writer);
    for entry in entries {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(i64::from(level)))
            .large_file(entry.size >= u64::from(u32::MAX));
        zip.start_file(entry.name.as_str(), options)?;
        let source = File::open(&entry.source)?;
        io::copy(&mut ProgressReader::new(source, progress), &mut zip)?;
    }
    let mut writer = zip.finish()?;
    writer.flush()
}

fn write_tar_gz<W: Write>(
    writer: W,
    entries: &[ArchiveEntry],
    level: u32,
    progress: &mut ByteProgress,
) -> io::Result<()> {
    let mut builder = tar::Builder::new(GzEncoder::new(writer, Compression::new(level)));
    for entry in entries {
        let source = File::open(&entry.source)?;
        let mut header = tar::Header::new_gnu();
        header.set_metadata(&source.metadata()?);
        builder.append_data(&mut header, &entry.name, ProgressReader::new(source, progress))?;
    }
    let mut writer = builder.into_inner()?.finish()?;
    writer.flush()
}

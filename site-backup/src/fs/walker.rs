//! Directory traversal for building export archives.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Follow symbolic links
    pub follow_links: bool,

    /// File or directory names skipped anywhere in the tree
    pub exclude_names: Vec<String>,

    /// Subtrees skipped entirely, relative to the walk root
    pub exclude_prefixes: Vec<PathBuf>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            follow_links: false,
            exclude_names: vec![
                ".git".to_string(),
                "node_modules".to_string(),
                ".DS_Store".to_string(),
            ],
            exclude_prefixes: Vec::new(),
        }
    }
}

/// A regular file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Relative path from the root
    pub relative_path: PathBuf,

    /// File size in bytes
    pub size: u64,
}

impl FileInfo {
    /// For symlinks, resolves the target to get the real file size.
    /// Returns None if the symlink target is a directory or cannot be resolved.
    fn from_entry(entry: &DirEntry, root: &Path) -> std::io::Result<Option<Self>> {
        let raw_metadata = entry.metadata()?;
        let path = entry.path().to_path_buf();
        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        let size = if raw_metadata.is_symlink() {
            match std::fs::metadata(&path) {
                Ok(resolved) if resolved.is_dir() => return Ok(None),
                Ok(resolved) => resolved.len(),
                // Broken symlink
                Err(_) => return Ok(None),
            }
        } else {
            raw_metadata.len()
        };

        Ok(Some(Self {
            path,
            relative_path,
            size,
        }))
    }
}

/// Walk a directory tree and collect all regular files, sorted by relative path.
///
/// A missing `root` yields an empty list.
pub fn walk_directory(root: &Path, options: &WalkOptions) -> std::io::Result<Vec<FileInfo>> {
    let mut files = Vec::new();
    if !root.exists() {
        return Ok(files);
    }

    let walker = WalkDir::new(root)
        .follow_links(options.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !should_exclude(entry, root, options));

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        if let Some(file_info) = FileInfo::from_entry(&entry, root)? {
            files.push(file_info);
        }
    }

    Ok(files)
}

/// Calculate total size of the given files
pub fn total_size(files: &[FileInfo]) -> u64 {
    files.iter().map(|f| f.size).sum()
}

fn should_exclude(entry: &DirEntry, root: &Path, options: &WalkOptions) -> bool {
    if entry.depth() == 0 {
        return false;
    }

    let file_name = entry.file_name().to_string_lossy();
    if options.exclude_names.iter().any(|name| file_name == name.as_str()) {
        return true;
    }

    let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
    options
        .exclude_prefixes
        .iter()
        .any(|prefix| relative.starts_with(prefix))
}

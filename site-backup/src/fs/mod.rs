//! Filesystem helpers shared by importers and exporters.

pub mod walker;

use std::path::Path;
use tracing::debug;

/// Move `from` to `to`, replacing any existing file at `to`.
///
/// Falls back to copy and remove when a rename is not possible, e.g. when the
/// extraction directory lives on another filesystem than the site.
pub async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::try_exists(to).await? {
        tokio::fs::remove_file(to).await?;
    }

    if let Err(e) = tokio::fs::rename(from, to).await {
        debug!("rename {} failed ({}), copying instead", from.display(), e);
        tokio::fs::copy(from, to).await?;
        tokio::fs::remove_file(from).await?;
    }
    Ok(())
}

/// Remove a file if it exists, ignoring "not found".
pub async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_overwrites() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let from = temp_dir.path().join("new.sqlite");
        let to = temp_dir.path().join("site/wp-content/database/.ht.sqlite");

        tokio::fs::write(&from, b"new").await?;
        tokio::fs::create_dir_all(to.parent().unwrap()).await?;
        tokio::fs::write(&to, b"old").await?;

        move_file(&from, &to).await?;
        assert_eq!(tokio::fs::read(&to).await?, b"new");
        assert!(!from.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_if_exists() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("tmp.sql");
        remove_if_exists(&path).await?;

        tokio::fs::write(&path, b"--").await?;
        remove_if_exists(&path).await?;
        assert!(!path.exists());
        Ok(())
    }
}

//! Provider metadata files: PHP and WordPress version hints.

use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::backup::BackupProvider;
use crate::utils::errors::{BackupError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub php_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wordpress_version: Option<String>,
}

/// Read and parse the meta file of `provider`.
///
/// Fields missing from the document are left as `None`; only unreadable or
/// malformed JSON is an error.
pub async fn parse_meta_file(provider: BackupProvider, path: &Path) -> Result<ImportMeta> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| BackupError::MetadataParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let doc: Value = serde_json::from_str(&raw).map_err(|e| BackupError::MetadataParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(meta_from_document(provider, &doc))
}

fn meta_from_document(provider: BackupProvider, doc: &Value) -> ImportMeta {
    let text = |pointer: &str| doc.pointer(pointer).and_then(Value::as_str).map(str::to_string);

    match provider {
        BackupProvider::Jetpack => ImportMeta {
            php_version: text("/phpVersion"),
            wordpress_version: text("/wordpressVersion"),
        },
        BackupProvider::Local => ImportMeta {
            php_version: text("/services/php/version").map(|v| major_minor(&v)),
            wordpress_version: text("/wordpress/version"),
        },
        BackupProvider::Playground => ImportMeta {
            php_version: text("/phpVersion").or_else(|| text("/preferredVersions/php")),
            wordpress_version: None,
        },
        BackupProvider::Wpress => ImportMeta {
            php_version: text("/PHP/Version").map(|v| major_minor(&v)),
            wordpress_version: text("/WordPress/Version"),
        },
        BackupProvider::Sql => ImportMeta::default(),
    }
}

/// `8.2.23` -> `8.2`
fn major_minor(version: &str) -> String {
    version.split('.').take(2).collect::<Vec<_>>().join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_major_minor() {
        assert_eq!(major_minor("8.2.23"), "8.2");
        assert_eq!(major_minor("7.4"), "7.4");
        assert_eq!(major_minor("8"), "8");
    }

    #[test]
    fn test_local_meta() {
        let doc = json!({"services": {"php": {"version": "8.2.23"}}, "wordpress": {"version": "6.5.2"}});
        let meta = meta_from_document(BackupProvider::Local, &doc);
        assert_eq!(meta.php_version.as_deref(), Some("8.2"));
        assert_eq!(meta.wordpress_version.as_deref(), Some("6.5.2"));
    }

    #[test]
    fn test_playground_meta_is_verbatim() {
        let doc = json!({"phpVersion": "8.3.1"});
        let meta = meta_from_document(BackupProvider::Playground, &doc);
        assert_eq!(meta.php_version.as_deref(), Some("8.3.1"));

        let doc = json!({"preferredVersions": {"php": "7.4", "wp": "latest"}});
        let meta = meta_from_document(BackupProvider::Playground, &doc);
        assert_eq!(meta.php_version.as_deref(), Some("7.4"));
    }

    #[test]
    fn test_wpress_and_jetpack_meta() {
        let doc = json!({"PHP": {"Version": "8.1.27"}, "WordPress": {"Version": "6.4.3"}});
        let meta = meta_from_document(BackupProvider::Wpress, &doc);
        assert_eq!(meta.php_version.as_deref(), Some("8.1"));
        assert_eq!(meta.wordpress_version.as_deref(), Some("6.4.3"));

        let doc = json!({"phpVersion": "8.0", "wordpressVersion": "6.3"});
        let meta = meta_from_document(BackupProvider::Jetpack, &doc);
        assert_eq!(meta.php_version.as_deref(), Some("8.0"));
        assert_eq!(meta.wordpress_version.as_deref(), Some("6.3"));
    }

    #[test]
    fn test_missing_fields_are_none() {
        let meta = meta_from_document(BackupProvider::Local, &json!({"name": "blog"}));
        assert_eq!(meta, ImportMeta::default());
    }

    #[tokio::test]
    async fn test_malformed_file_is_metadata_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("local-site.json");
        tokio::fs::write(&path, "{ not json").await?;

        let err = parse_meta_file(BackupProvider::Local, &path).await.unwrap_err();
        assert_eq!(err.kind(), "metadata-parse-failure");
        Ok(())
    }
}

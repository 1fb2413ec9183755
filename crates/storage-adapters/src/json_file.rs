//! # JSON-file local storage
//!
//! Device-local key/value storage kept in a directory: one `<key>.json` file
//! per key. Writes go to a temporary sibling first and are renamed into place,
//! so a reader never observes a half-written value.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use domains::LocalStorage;
use tokio::fs;
use tracing::debug;

pub struct JsonFileLocalStorage {
    /// Directory holding one file per key (e.g. "./data/local").
    root_path: PathBuf,
}

impl JsonFileLocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root_path: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Keys become file names; anything outside `[A-Za-z0-9_-]` is replaced so a
    /// key can never escape the root directory.
    fn key_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root_path.join(format!("{name}.json"))
    }
}

#[async_trait]
impl LocalStorage for JsonFileLocalStorage {
    async fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.key_path(key);
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        fs::create_dir_all(&self.root_path)
            .await
            .with_context(|| format!("create {}", self.root_path.display()))?;

        let path = self.key_path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("rename {} into place", tmp.display()))?;

        debug!(key, bytes = value.len(), "local item written");
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        let path = self.key_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_values_survive_a_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let first = JsonFileLocalStorage::new(dir.path().join("local"));
        first.set_item("cart", r#"[{"ad_id":"a"}]"#).await.unwrap();

        let second = JsonFileLocalStorage::new(dir.path().join("local"));
        assert_eq!(
            second.get_item("cart").await.unwrap().as_deref(),
            Some(r#"[{"ad_id":"a"}]"#)
        );
    }

    #[tokio::test]
    async fn test_missing_key_reads_none_and_removes_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileLocalStorage::new(dir.path());
        assert_eq!(storage.get_item("nothing").await.unwrap(), None);
        storage.remove_item("nothing").await.unwrap();
    }

    #[test]
    fn test_keys_cannot_escape_root() {
        let storage = JsonFileLocalStorage::new("/tmp/market");
        let path = storage.key_path("../../etc/passwd");
        assert_eq!(path, PathBuf::from("/tmp/market/______etc_passwd.json"));
    }
}

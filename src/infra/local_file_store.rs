use crate::app::ports::FileStorePort;
use crate::error::StoreError;
use crate::pipeline::selection::join_key;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

/// Filesystem-backed store rooted at a directory. Keys are `/`-separated paths
/// relative to the root.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(key
            .split('/')
            .filter(|seg| !seg.is_empty())
            .fold(self.root.clone(), |path, seg| path.join(seg)))
    }
}

/// Reject keys that would escape the store root
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = |reason: &str| StoreError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.starts_with('/') {
        return Err(invalid("must not start with '/'"));
    }
    if key.contains('\\') {
        return Err(invalid("must not contain '\\'"));
    }
    if key.split('/').any(|seg| seg == "..") {
        return Err(invalid("must not contain '..' segments"));
    }
    Ok(())
}

fn not_found_as(key: &str, err: std::io::Error) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Io(err)
    }
}

#[async_trait]
impl FileStorePort for LocalFileStore {
    async fn list(&self, location: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.path_for(location)?;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                keys.push(join_key(location, name));
            }
        }
        debug!("Listed {} files under {}", keys.len(), dir.display());
        Ok(keys)
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| not_found_as(key, e))
    }

    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write then rename so readers never see a partial object
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(&path).await.map_err(|e| not_found_as(key, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn upload_list_download_delete() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        store.upload("raw/0001.json", b"[]".to_vec()).await.unwrap();
        store.upload("raw/0002.json", b"{}".to_vec()).await.unwrap();
        store.upload("raw/nested/0003.json", b"{}".to_vec()).await.unwrap();

        let mut keys = store.list("raw").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["raw/0001.json", "raw/0002.json"]);

        assert_eq!(store.download("raw/0002.json").await.unwrap(), b"{}");

        store.delete("raw/0002.json").await.unwrap();
        assert!(store.download("raw/0002.json").await.unwrap_err().is_not_found());
        assert!(store.delete("raw/0002.json").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn root_location_lists_top_level() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        store.upload("0001.json", b"[]".to_vec()).await.unwrap();
        assert_eq!(store.list("").await.unwrap(), vec!["0001.json"]);
    }

    #[tokio::test]
    async fn missing_location_fails_listing() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        assert!(matches!(store.list("absent").await, Err(StoreError::Io(_))));
    }

    #[tokio::test]
    async fn keys_cannot_escape_root() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        assert!(matches!(
            store.download("../etc/passwd").await,
            Err(StoreError::InvalidKey { .. })
        ));
        assert!(matches!(
            store.upload("/abs.json", vec![]).await,
            Err(StoreError::InvalidKey { .. })
        ));
    }
}

use crate::app::ports::{CursorStorePort, FileStorePort};
use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Cursor kept as the whole UTF-8 content of one key in a file store.
pub struct FileCursorStore {
    store: Arc<dyn FileStorePort>,
    key: String,
}

impl FileCursorStore {
    pub fn new(store: Arc<dyn FileStorePort>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

#[async_trait]
impl CursorStorePort for FileCursorStore {
    async fn get(&self) -> Result<Option<String>, StoreError> {
        match self.store.download(&self.key).await {
            Ok(bytes) => {
                let value = String::from_utf8(bytes).map_err(|e| StoreError::InvalidData {
                    key: self.key.clone(),
                    reason: e.to_string(),
                })?;
                // Only a trailing line break added by an editor is dropped
                Ok(Some(value.trim_end_matches(|c| c == '\n' || c == '\r').to_string()))
            }
            Err(e) if e.is_not_found() => {
                debug!("No cursor stored at {}", self.key);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn set(&self, cursor: &str) -> Result<(), StoreError> {
        self.store.upload(&self.key, cursor.as_bytes().to_vec()).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match self.store.delete(&self.key).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::in_memory_file_store::InMemoryFileStore;

    #[tokio::test]
    async fn missing_key_means_no_cursor() {
        let cursor = FileCursorStore::new(Arc::new(InMemoryFileStore::new()), "state.data");
        assert_eq!(cursor.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let files = InMemoryFileStore::new();
        let cursor = FileCursorStore::new(Arc::new(files.clone()), "state.data");
        cursor.set("1717298290.json").await.unwrap();
        assert_eq!(files.get("state.data"), Some(b"1717298290.json".to_vec()));
        assert_eq!(cursor.get().await.unwrap().as_deref(), Some("1717298290.json"));
    }

    #[tokio::test]
    async fn trailing_newline_is_dropped() {
        let files = InMemoryFileStore::new();
        files.insert("state.data", "1717298290.json\r\n");
        let cursor = FileCursorStore::new(Arc::new(files), "state.data");
        assert_eq!(cursor.get().await.unwrap().as_deref(), Some("1717298290.json"));
    }

    #[tokio::test]
    async fn leading_whitespace_is_kept() {
        let files = InMemoryFileStore::new();
        files.insert("state.data", " 0001.json");
        let cursor = FileCursorStore::new(Arc::new(files), "state.data");
        assert_eq!(cursor.get().await.unwrap().as_deref(), Some(" 0001.json"));
    }

    #[tokio::test]
    async fn non_utf8_cursor_is_an_error() {
        let files = InMemoryFileStore::new();
        files.insert("state.data", vec![0x30, 0xff, 0xfe]);
        let cursor = FileCursorStore::new(Arc::new(files), "state.data");
        let err = cursor.get().await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidData { ref key, .. } if key == "state.data"));
    }

    #[tokio::test]
    async fn clear_tolerates_missing_key() {
        let files = InMemoryFileStore::new();
        files.insert("state.data", "0001.json");
        let cursor = FileCursorStore::new(Arc::new(files.clone()), "state.data");
        cursor.clear().await.unwrap();
        cursor.clear().await.unwrap();
        assert!(files.keys().is_empty());
    }
}

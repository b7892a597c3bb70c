use crate::app::ports::FileStorePort;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// In-memory store for development and tests. Keeps a log of downloaded keys
/// so callers can check what a run actually fetched.
#[derive(Clone, Default)]
pub struct InMemoryFileStore {
    objects: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    downloads: Arc<Mutex<Vec<String>>>,
    uploads: Arc<Mutex<Vec<String>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.objects.lock().unwrap().insert(key.into(), data.into());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    /// Keys passed to `download`, in call order
    pub fn downloaded(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    /// Keys passed to `upload`, in call order
    pub fn uploaded(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

fn in_location(key: &str, location: &str) -> bool {
    let location = location.trim_matches('/');
    let rest = if location.is_empty() {
        key
    } else {
        match key.strip_prefix(location).and_then(|r| r.strip_prefix('/')) {
            Some(r) => r,
            None => return false,
        }
    };
    !rest.is_empty() && !rest.contains('/')
}

#[async_trait]
impl FileStorePort for InMemoryFileStore {
    async fn list(&self, location: &str) -> Result<Vec<String>, StoreError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .keys()
            .filter(|k| in_location(k, location))
            .cloned()
            .collect())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.downloads.lock().unwrap().push(key.to_string());
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        debug!("Stored {} bytes at {}", data.len(), key);
        self.uploads.lock().unwrap().push(key.to_string());
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

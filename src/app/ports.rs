use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

use crate::error::{MapperError, StoreError};

/// Object storage seen by the pipeline: keys are opaque `/`-separated strings
/// relative to the store root.
#[async_trait]
pub trait FileStorePort: Send + Sync {
    /// List every object key directly under `location`.
    ///
    /// A location that does not exist is backend specific: a directory store
    /// fails (the run stops at listing), while object stores without real
    /// folders return an empty list (the run reports no new files).
    async fn list(&self, location: &str) -> Result<Vec<String>, StoreError>;
    /// Fetch an object's bytes. A missing key is `StoreError::NotFound`.
    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError>;
    /// Create or replace an object.
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Persisted cursor: the base name of the last committed input file.
#[async_trait]
pub trait CursorStorePort: Send + Sync {
    /// `None` when no cursor was ever committed.
    async fn get(&self) -> Result<Option<String>, StoreError>;
    async fn set(&self, cursor: &str) -> Result<(), StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}

/// One labeled output of a transform.
#[derive(Debug, Clone)]
pub struct NamedDataset {
    pub name: Option<String>,
    pub batch: RecordBatch,
}

impl NamedDataset {
    pub fn new(name: impl Into<String>, batch: RecordBatch) -> Self {
        Self {
            name: Some(name.into()),
            batch,
        }
    }

    pub fn unnamed(batch: RecordBatch) -> Self {
        Self { name: None, batch }
    }

    /// Name used in logs and errors
    pub fn label(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("<unnamed>")
    }
}

/// Business transform applied to every batch. Must be a pure function of the
/// batch so that a retried run produces the same datasets.
pub trait RecordMapper: Send + Sync {
    fn transform(&self, batch: &RecordBatch) -> Result<Vec<NamedDataset>, MapperError>;

    fn mapper_name(&self) -> &'static str;
}

use arrow::record_batch::RecordBatch;

use crate::app::ports::{NamedDataset, RecordMapper};
use crate::error::MapperError;

/// Writes the assembled batch unchanged as a single dataset.
#[derive(Debug, Default)]
pub struct PassthroughMapper {
    name: Option<String>,
}

impl PassthroughMapper {
    pub fn new(name: Option<String>) -> Self {
        Self { name }
    }
}

impl RecordMapper for PassthroughMapper {
    fn transform(&self, batch: &RecordBatch) -> Result<Vec<NamedDataset>, MapperError> {
        let dataset = match &self.name {
            Some(name) => NamedDataset::new(name.clone(), batch.clone()),
            None => NamedDataset::unnamed(batch.clone()),
        };
        Ok(vec![dataset])
    }

    fn mapper_name(&self) -> &'static str {
        "passthrough"
    }
}

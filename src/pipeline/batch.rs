//! JSON documents to one Arrow record batch.
//!
//! Each input file holds either a single JSON object (one record) or an array
//! of objects. Nested objects are flattened into dotted column names
//! (`address.street`), arrays are kept as list values. The schema is inferred
//! over every record of the batch so that files with different fields still
//! concatenate; a column missing from a record is null in that row.
//!
//! A column that holds arrays in some records and scalars in others has no
//! single Arrow type. Such a column is written as text: strings stay as they
//! are and every other value becomes its JSON rendering (`["a","b"]`).

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;

use arrow::datatypes::Schema;
use arrow::json::reader::infer_json_schema_from_iterator;
use arrow::json::ReaderBuilder;
use arrow::record_batch::RecordBatch;
use serde_json::{Map, Value};
use tracing::debug;

use crate::constants::COLUMN_PATH_SEPARATOR;
use crate::error::BatchError;

/// One flattened input record
pub type Record = Map<String, Value>;

/// Parse one downloaded document into flattened records, in document order.
pub fn parse_document(bytes: &[u8]) -> Result<Vec<Record>, BatchError> {
    let value: Value = serde_json::from_slice(bytes)?;
    match value {
        Value::Object(obj) => Ok(vec![flatten_record(obj)]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(obj) => Ok(flatten_record(obj)),
                other => Err(BatchError::NotARecord(json_kind(&other).to_string())),
            })
            .collect(),
        other => Err(BatchError::NotARecord(json_kind(&other).to_string())),
    }
}

/// Flatten nested objects into `parent.child` keys. Empty nested objects carry
/// no column and are dropped.
pub fn flatten_record(obj: Map<String, Value>) -> Record {
    let mut out = Map::new();
    flatten_into(&mut out, None, obj);
    out
}

fn flatten_into(out: &mut Record, prefix: Option<&str>, obj: Map<String, Value>) {
    for (key, value) in obj {
        let path = match prefix {
            Some(p) => format!("{}{}{}", p, COLUMN_PATH_SEPARATOR, key),
            None => key,
        };
        match value {
            Value::Object(nested) => flatten_into(out, Some(&path), nested),
            leaf => {
                out.insert(path, leaf);
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Build one record batch from every record, preserving order. No records
/// gives an empty batch with an empty schema.
pub fn assemble(records: &[Record]) -> Result<RecordBatch, BatchError> {
    if records.is_empty() {
        return Ok(RecordBatch::new_empty(Arc::new(Schema::empty())));
    }

    let mixed = mixed_list_columns(records);
    let records: Cow<'_, [Record]> = if mixed.is_empty() {
        Cow::Borrowed(records)
    } else {
        debug!("Writing columns {:?} as JSON text", mixed);
        Cow::Owned(records.iter().map(|r| render_as_text(r, &mixed)).collect())
    };
    let records = records.as_ref();

    let schema = infer_json_schema_from_iterator(
        records.iter().map(|r| Ok(Value::Object(r.clone()))),
    )?;

    let mut decoder = ReaderBuilder::new(Arc::new(schema.clone()))
        .with_batch_size(records.len())
        .with_coerce_primitive(true)
        .build_decoder()?;
    decoder.serialize(records)?;

    match decoder.flush()? {
        Some(batch) => Ok(batch),
        None => Ok(RecordBatch::new_empty(Arc::new(schema))),
    }
}

/// Columns that hold an array in some record and a non-null scalar in another
fn mixed_list_columns(records: &[Record]) -> BTreeSet<String> {
    let mut lists = BTreeSet::new();
    let mut scalars = BTreeSet::new();
    for record in records {
        for (name, value) in record {
            match value {
                Value::Null => {}
                Value::Array(_) => {
                    lists.insert(name.as_str());
                }
                _ => {
                    scalars.insert(name.as_str());
                }
            }
        }
    }
    lists
        .intersection(&scalars)
        .map(|name| name.to_string())
        .collect()
}

fn render_as_text(record: &Record, columns: &BTreeSet<String>) -> Record {
    record
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::Null | Value::String(_) => value.clone(),
                other if columns.contains(name) => Value::String(other.to_string()),
                other => other.clone(),
            };
            (name.clone(), value)
        })
        .collect()
}

/// Accumulates the records of every selected file in processing order.
#[derive(Debug, Default)]
pub struct BatchBuilder {
    records: Vec<Record>,
    files: usize,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and append one file's content. Returns the number of records the
    /// file contributed; zero is legal.
    pub fn push_document(&mut self, bytes: &[u8]) -> Result<usize, BatchError> {
        let records = parse_document(bytes)?;
        let count = records.len();
        self.records.extend(records);
        self.files += 1;
        Ok(count)
    }

    pub fn file_count(&self) -> usize {
        self.files
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn finish(self) -> Result<RecordBatch, BatchError> {
        assemble(&self.records)
    }
}

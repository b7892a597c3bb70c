use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::errors::{ParquetError, Result};
use parquet::file::properties::WriterProperties;
use sha2::{Digest, Sha256};

use crate::constants::PARQUET_EXTENSION;

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build()
}

/// Serialize one batch into an in-memory Parquet file
pub fn to_parquet(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut writer = ArrowWriter::try_new(Vec::new(), batch.schema(), Some(writer_properties()))?;
    writer.write(batch)?;
    writer.into_inner()
}

/// Read every batch back from Parquet bytes
pub fn read_parquet(data: Vec<u8>) -> Result<Vec<RecordBatch>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(data))?.build()?;
    reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ParquetError::General(e.to_string()))
}

/// `<millis>-<name>.parquet`, or `<millis>.parquet` when the dataset has no name
pub fn output_file_name(timestamp_millis: i64, name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => format!("{}-{}.{}", timestamp_millis, n, PARQUET_EXTENSION),
        None => format!("{}.{}", timestamp_millis, PARQUET_EXTENSION),
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, ArrayRef, AsArray, Int64Array, StringArray};
    use arrow::datatypes::Int64Type;
    use std::sync::Arc;

    fn users() -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            ("id", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
            (
                "email",
                Arc::new(StringArray::from(vec![Some("Sincere@april.biz"), None, Some("Nathan@yesenia.net")])) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    #[test]
    fn parquet_round_trip_keeps_values() {
        let batch = users();
        let data = to_parquet(&batch).unwrap();
        assert_eq!(&data[..4], b"PAR1");

        let read = read_parquet(data).unwrap();
        let total: usize = read.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total, 3);

        let back = &read[0];
        assert_eq!(back.schema().fields().len(), 2);
        let ids = back.column_by_name("id").unwrap().as_primitive::<Int64Type>();
        assert_eq!(ids.values().to_vec(), vec![1, 2, 3]);
        let emails = back.column_by_name("email").unwrap().as_string::<i32>();
        assert_eq!(emails.value(0), "Sincere@april.biz");
        assert!(emails.is_null(1));
        assert_eq!(emails.value(2), "Nathan@yesenia.net");
    }

    #[test]
    fn file_name_embeds_dataset_name() {
        assert_eq!(output_file_name(1717298290123, Some("user_data")), "1717298290123-user_data.parquet");
        assert_eq!(output_file_name(1717298290123, None), "1717298290123.parquet");
        assert_eq!(output_file_name(1717298290123, Some("  ")), "1717298290123.parquet");
    }

    #[test]
    fn checksum_is_stable() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}

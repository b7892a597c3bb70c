//! Incremental batch processing.
//!
//! One run reads the cursor, selects every input file whose base name sorts
//! after it, folds their records into one batch, hands the batch to the mapper
//! and uploads each resulting dataset as Parquet. The cursor is written last:
//! if anything before it fails, the cursor stays where it was and the next run
//! re-selects the same files. Outputs uploaded by a failed attempt are left in
//! place, so consumers must tolerate duplicate output files.
//!
//! Runs must not overlap for the same input, output and cursor.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::app::ports::{CursorStorePort, FileStorePort, RecordMapper};
use crate::error::{ProcessError, Result, StoreError};
use crate::observability::metrics;
use crate::pipeline::batch::BatchBuilder;
use crate::pipeline::parquet_out::{output_file_name, sha256_hex, to_parquet};
use crate::pipeline::selection::{join_key, next_cursor, select_new_files};

/// One dataset written by a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDataset {
    pub key: String,
    pub name: Option<String>,
    pub rows: usize,
    pub bytes: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    ProcessedBatch {
        file_count: usize,
        record_count: usize,
        dataset_count: usize,
        cursor: String,
        outputs: Vec<UploadedDataset>,
    },
    NoNewFiles,
}

/// Cursor and backlog, computed without downloading anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStatus {
    pub cursor: Option<String>,
    pub pending: Vec<String>,
}

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

pub struct Processor {
    input: Arc<dyn FileStorePort>,
    output: Arc<dyn FileStorePort>,
    cursor: Arc<dyn CursorStorePort>,
    mapper: Box<dyn RecordMapper>,
    clock: Clock,
}

impl Processor {
    pub fn new(
        input: Arc<dyn FileStorePort>,
        output: Arc<dyn FileStorePort>,
        cursor: Arc<dyn CursorStorePort>,
        mapper: Box<dyn RecordMapper>,
    ) -> Self {
        Self {
            input,
            output,
            cursor,
            mapper,
            clock: Box::new(|| chrono::Utc::now().timestamp_millis()),
        }
    }

    /// Replace the millisecond clock used to name output files
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Process every input file that arrived after the cursor and commit the
    /// cursor once all outputs are uploaded.
    #[instrument(skip(self), fields(run_id = %Uuid::new_v4(), mapper = self.mapper.mapper_name()))]
    pub async fn run(&self, input_location: &str, output_location: &str) -> Result<RunResult> {
        metrics::run_started();
        let started = Instant::now();

        let result = self.process(input_location, output_location, started).await;
        if let Err(e) = &result {
            metrics::run_failed(e.stage());
            error!(stage = %e.stage(), orphaned_outputs = e.outputs_orphaned(), "Run failed: {}", e);
        }
        result
    }

    async fn process(&self, input_location: &str, output_location: &str, started: Instant) -> Result<RunResult> {
        let last = self.cursor.get().await.map_err(ProcessError::CursorRead)?;
        let last = last.unwrap_or_default();
        debug!("Current cursor: '{}'", last);

        let selection = self.select(input_location, &last).await?;
        if selection.is_empty() {
            info!("No new files under '{}' after cursor '{}'", input_location, last);
            metrics::run_empty();
            return Ok(RunResult::NoNewFiles);
        }
        info!("Selected {} new files", selection.len());

        let mut builder = BatchBuilder::new();
        for key in &selection {
            let bytes = self
                .input
                .download(key)
                .await
                .map_err(|source| ProcessError::Fetch { key: key.clone(), source })?;
            let records = builder
                .push_document(&bytes)
                .map_err(|source| ProcessError::Parse { key: key.clone(), source })?;
            debug!("Read {} records from {}", records, key);
        }
        let file_count = builder.file_count();
        let record_count = builder.record_count();
        let batch = builder.finish().map_err(ProcessError::Assemble)?;

        let datasets = self.mapper.transform(&batch).map_err(ProcessError::Transform)?;
        debug!("Mapper produced {} datasets from {} records", datasets.len(), record_count);

        let mut outputs = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            if dataset.batch.num_columns() == 0 {
                warn!("Dataset {} has no columns, nothing to write", dataset.label());
                continue;
            }
            let data = to_parquet(&dataset.batch).map_err(|source| ProcessError::Serialize {
                name: dataset.label().to_string(),
                source,
            })?;
            let file_name = output_file_name((self.clock)(), dataset.name.as_deref());
            let key = join_key(output_location, &file_name);
            let uploaded = UploadedDataset {
                key: key.clone(),
                name: dataset.name.clone(),
                rows: dataset.batch.num_rows(),
                bytes: data.len(),
                sha256: sha256_hex(&data),
            };

            self.output
                .upload(&key, data)
                .await
                .map_err(|source| ProcessError::Upload { key: key.clone(), source })?;
            info!("Uploaded {} ({} rows, {} bytes)", key, uploaded.rows, uploaded.bytes);
            metrics::dataset_uploaded(dataset.label(), uploaded.bytes);
            outputs.push(uploaded);
        }

        // Commit last: only now is every output durable
        let new_cursor = next_cursor(&selection).unwrap_or_default().to_string();
        self.cursor
            .set(&new_cursor)
            .await
            .map_err(|source| ProcessError::CursorWrite {
                cursor: new_cursor.clone(),
                source,
            })?;

        let duration = started.elapsed().as_secs_f64();
        metrics::run_committed(file_count, record_count, duration);
        info!(
            "Committed cursor '{}' after {} files, {} records, {} datasets",
            new_cursor,
            file_count,
            record_count,
            outputs.len()
        );

        Ok(RunResult::ProcessedBatch {
            file_count,
            record_count,
            dataset_count: outputs.len(),
            cursor: new_cursor,
            outputs,
        })
    }

    async fn select(&self, input_location: &str, cursor: &str) -> Result<Vec<String>> {
        let keys = self
            .input
            .list(input_location)
            .await
            .map_err(|source| ProcessError::Listing {
                location: input_location.to_string(),
                source,
            })?;
        Ok(select_new_files(keys, cursor))
    }

    /// Current cursor and the keys the next run would select
    #[instrument(skip(self))]
    pub async fn status(&self, input_location: &str) -> Result<PendingStatus> {
        let cursor = self.cursor.get().await.map_err(ProcessError::CursorRead)?;
        let pending = self
            .select(input_location, cursor.as_deref().unwrap_or_default())
            .await?;
        Ok(PendingStatus { cursor, pending })
    }

    /// Forget the cursor so the next run re-processes every input file
    pub async fn reset_cursor(&self) -> std::result::Result<(), StoreError> {
        self.cursor.clear().await?;
        info!("Cursor cleared");
        Ok(())
    }
}

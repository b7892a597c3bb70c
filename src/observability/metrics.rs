//! Metrics for the transform pipeline
//!
//! Recorded through the `metrics` facade into the Prometheus recorder that
//! `init` installs. Before `init` (and in unit tests) the calls are no-ops.

use std::fmt;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

use crate::error::Stage;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the global Prometheus recorder. Calling it again returns the
/// handle of the recorder already installed.
pub fn init() -> Result<PrometheusHandle, BuildError> {
    HANDLE
        .get_or_try_init(|| {
            PrometheusBuilder::new().install_recorder().map(|handle| {
                info!("Metrics recorder installed");
                handle
            })
        })
        .cloned()
}

/// Handle of the installed recorder, if `init` succeeded
pub fn handle() -> Option<&'static PrometheusHandle> {
    HANDLE.get()
}

/// Every metric name emitted by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    RunsStarted,
    RunsCommitted,
    RunsEmpty,
    RunsFailed,
    FilesSelected,
    RecordsRead,
    DatasetsUploaded,
    BytesUploaded,
    RunDuration,
    LastCommit,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricName::RunsStarted => "etl_runs_started_total",
            MetricName::RunsCommitted => "etl_runs_committed_total",
            MetricName::RunsEmpty => "etl_runs_no_new_files_total",
            MetricName::RunsFailed => "etl_runs_failed_total",
            MetricName::FilesSelected => "etl_files_selected_total",
            MetricName::RecordsRead => "etl_records_read_total",
            MetricName::DatasetsUploaded => "etl_datasets_uploaded_total",
            MetricName::BytesUploaded => "etl_bytes_uploaded_total",
            MetricName::RunDuration => "etl_run_duration_seconds",
            MetricName::LastCommit => "etl_last_commit_timestamp_seconds",
        };
        write!(f, "{}", name)
    }
}

impl MetricName {
    pub fn as_str(&self) -> String {
        self.to_string()
    }
}

pub fn run_started() {
    metrics::counter!(MetricName::RunsStarted.as_str()).increment(1);
}

pub fn run_committed(files: usize, records: usize, duration_secs: f64) {
    metrics::counter!(MetricName::RunsCommitted.as_str()).increment(1);
    metrics::counter!(MetricName::FilesSelected.as_str()).increment(files as u64);
    metrics::counter!(MetricName::RecordsRead.as_str()).increment(records as u64);
    metrics::histogram!(MetricName::RunDuration.as_str()).record(duration_secs);
    metrics::gauge!(MetricName::LastCommit.as_str()).set(chrono::Utc::now().timestamp() as f64);
}

pub fn run_empty() {
    metrics::counter!(MetricName::RunsEmpty.as_str()).increment(1);
}

pub fn run_failed(stage: Stage) {
    metrics::counter!(MetricName::RunsFailed.as_str(), "stage" => stage.as_str()).increment(1);
}

pub fn dataset_uploaded(dataset: &str, bytes: usize) {
    metrics::counter!(MetricName::DatasetsUploaded.as_str(), "dataset" => dataset.to_string()).increment(1);
    metrics::counter!(MetricName::BytesUploaded.as_str()).increment(bytes as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_prometheus_conventions() {
        assert_eq!(MetricName::RunsFailed.to_string(), "etl_runs_failed_total");
        assert_eq!(MetricName::RunDuration.as_str(), "etl_run_duration_seconds");
    }

    #[test]
    fn recording_without_recorder_is_a_noop() {
        run_started();
        run_failed(Stage::Upload);
        dataset_uploaded("user_data", 128);
        run_committed(2, 10, 0.5);
    }

    #[test]
    fn recorded_values_reach_the_prometheus_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            run_started();
            run_failed(Stage::Upload);
            dataset_uploaded("user_data", 128);
            run_committed(2, 10, 0.5);
        });

        let text = handle.render();
        assert!(text.contains("etl_runs_started_total 1"));
        assert!(text.contains("etl_runs_failed_total{stage=\"upload\"} 1"));
        assert!(text.contains("etl_datasets_uploaded_total{dataset=\"user_data\"} 1"));
        assert!(text.contains("etl_bytes_uploaded_total 128"));
        assert!(text.contains("etl_records_read_total 10"));
        assert!(text.contains("etl_last_commit_timestamp_seconds"));
    }
}

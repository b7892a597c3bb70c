use std::path::Path;
use std::sync::Arc;

use arrow::array::AsArray;
use arrow::record_batch::RecordBatch;
use arrow::datatypes::Int64Type;
use tempfile::TempDir;

use json_batch_etl::app::ports::FileStorePort;
use json_batch_etl::app::process_use_case::{Processor, RunResult};
use json_batch_etl::constants::{DEFAULT_COMPANY_DATASET, DEFAULT_CURSOR_KEY, DEFAULT_USER_DATASET};
use json_batch_etl::error::Stage;
use json_batch_etl::infra::{FileCursorStore, LocalFileStore};
use json_batch_etl::pipeline::mappers::BusinessMapper;
use json_batch_etl::pipeline::parquet_out::read_parquet;

const INPUT: &str = "raw";
const OUTPUT: &str = "transformed";

/// Store root with the fixture files copied under `raw/`
fn seeded_root() -> TempDir {
    let root = TempDir::new().unwrap();
    let input_dir = root.path().join(INPUT);
    std::fs::create_dir_all(&input_dir).unwrap();

    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/resources/input");
    for entry in std::fs::read_dir(fixtures).unwrap() {
        let entry = entry.unwrap();
        std::fs::copy(entry.path(), input_dir.join(entry.file_name())).unwrap();
    }
    root
}

fn processor(root: &Path) -> Processor {
    let store: Arc<dyn FileStorePort> = Arc::new(LocalFileStore::new(root));
    let cursor = Arc::new(FileCursorStore::new(store.clone(), DEFAULT_CURSOR_KEY));
    Processor::new(
        store.clone(),
        store,
        cursor,
        Box::new(BusinessMapper::new(DEFAULT_USER_DATASET, DEFAULT_COMPANY_DATASET)),
    )
}

fn stored_cursor(root: &Path) -> Option<String> {
    std::fs::read_to_string(root.join(DEFAULT_CURSOR_KEY)).ok()
}

async fn read_output(root: &Path, suffix: &str) -> RecordBatch {
    let store = LocalFileStore::new(root);
    let keys = store.list(OUTPUT).await.unwrap();
    let key = keys
        .iter()
        .find(|k| k.ends_with(suffix))
        .unwrap_or_else(|| panic!("no output ending in {} among {:?}", suffix, keys));
    let batches = read_parquet(store.download(key).await.unwrap()).unwrap();
    assert_eq!(batches.len(), 1);
    batches.into_iter().next().unwrap()
}

fn strings(batch: &RecordBatch, column: &str) -> Vec<String> {
    batch
        .column_by_name(column)
        .unwrap()
        .as_string::<i32>()
        .iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn first_run_processes_all_files() {
    let root = seeded_root();

    let result = processor(root.path()).run(INPUT, OUTPUT).await.unwrap();

    match result {
        RunResult::ProcessedBatch {
            file_count,
            record_count,
            dataset_count,
            cursor,
            outputs,
        } => {
            assert_eq!(file_count, 4);
            assert_eq!(record_count, 4);
            assert_eq!(dataset_count, 2);
            assert_eq!(cursor, "1717298291.json");
            assert_eq!(outputs[0].rows, 3);
            assert_eq!(outputs[1].rows, 2);
            assert!(outputs.iter().all(|o| o.key.starts_with("transformed/")));
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(stored_cursor(root.path()).as_deref(), Some("1717298291.json"));

    let users = read_output(root.path(), "-user_data.parquet").await;
    assert_eq!(users.num_rows(), 3);
    assert_eq!(strings(&users, "id"), vec!["1", "2", "3"]);
    assert_eq!(strings(&users, "domain"), vec!["april.biz", "melissa.tv", "yesenia.net"]);
    assert_eq!(
        strings(&users, "full_address")[0],
        "Kulas Light, Apt. 556, Gwenborough, 92998-3874"
    );

    let companies = read_output(root.path(), "-company_data.parquet").await;
    assert_eq!(strings(&companies, "company.name"), vec!["Deckow-Crist", "Romaguera-Crona"]);
    let counts = companies.column_by_name("user_count").unwrap().as_primitive::<Int64Type>();
    assert_eq!(counts.values().to_vec(), vec![1, 2]);
}

#[tokio::test]
async fn existing_cursor_limits_the_batch() {
    let root = seeded_root();
    std::fs::write(root.path().join(DEFAULT_CURSOR_KEY), "1717298290.json").unwrap();

    let result = processor(root.path()).run(INPUT, OUTPUT).await.unwrap();

    assert!(matches!(
        result,
        RunResult::ProcessedBatch { file_count: 1, record_count: 1, .. }
    ));
    assert_eq!(stored_cursor(root.path()).as_deref(), Some("1717298291.json"));

    let users = read_output(root.path(), "-user_data.parquet").await;
    assert_eq!(strings(&users, "id"), vec!["3"]);
    assert_eq!(strings(&users, "username"), vec!["Samantha"]);
}

#[tokio::test]
async fn no_json_files_leaves_everything_untouched() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join(INPUT)).unwrap();
    std::fs::write(root.path().join(INPUT).join("notes.txt"), "ignored").unwrap();

    let result = processor(root.path()).run(INPUT, OUTPUT).await.unwrap();

    assert_eq!(result, RunResult::NoNewFiles);
    assert_eq!(stored_cursor(root.path()), None);
    assert!(!root.path().join(OUTPUT).exists());
}

#[tokio::test]
async fn rerun_after_commit_finds_nothing_new() {
    let root = seeded_root();
    let processor = processor(root.path());

    processor.run(INPUT, OUTPUT).await.unwrap();
    assert_eq!(processor.run(INPUT, OUTPUT).await.unwrap(), RunResult::NoNewFiles);

    let outputs = std::fs::read_dir(root.path().join(OUTPUT)).unwrap().count();
    assert_eq!(outputs, 2);
}

#[tokio::test]
async fn malformed_file_keeps_cursor_and_skips_output() {
    let root = seeded_root();
    std::fs::write(root.path().join(INPUT).join("1717298292.json"), "{\"id\": ").unwrap();

    let err = processor(root.path()).run(INPUT, OUTPUT).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Parse);
    assert!(err.to_string().contains("1717298292.json"));
    assert_eq!(stored_cursor(root.path()), None);
    assert!(!root.path().join(OUTPUT).exists());
}

#[tokio::test]
async fn missing_input_location_is_a_listing_error() {
    let root = TempDir::new().unwrap();

    let err = processor(root.path()).run(INPUT, OUTPUT).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Listing);
    assert_eq!(stored_cursor(root.path()), None);
}

#[tokio::test]
async fn status_and_reset_round_trip() {
    let root = seeded_root();
    let processor = processor(root.path());

    let before = processor.status(INPUT).await.unwrap();
    assert_eq!(before.cursor, None);
    assert_eq!(before.pending.len(), 4);

    processor.run(INPUT, OUTPUT).await.unwrap();
    let after = processor.status(INPUT).await.unwrap();
    assert_eq!(after.cursor.as_deref(), Some("1717298291.json"));
    assert!(after.pending.is_empty());

    processor.reset_cursor().await.unwrap();
    assert_eq!(stored_cursor(root.path()), None);
    assert_eq!(processor.status(INPUT).await.unwrap().pending.len(), 4);
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use json_batch_etl::app::ports::{CursorStorePort, FileStorePort};
use json_batch_etl::app::process_use_case::{Processor, RunResult};
use json_batch_etl::config::Config;
use json_batch_etl::infra::{build_file_store, FileCursorStore};
use json_batch_etl::observability::{init_logging, metrics, push_metrics};
use json_batch_etl::pipeline::mappers::build_mapper;
use json_batch_etl::pipeline::parquet_out::read_parquet;

#[derive(Parser)]
#[command(name = "json_batch_etl")]
#[command(about = "Incremental JSON to Parquet batch transformer")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every input file newer than the cursor, then advance it
    Run {
        /// Input location (overrides pipeline.input_location)
        #[arg(long)]
        input: Option<String>,
        /// Output location (overrides pipeline.output_location)
        #[arg(long)]
        output: Option<String>,
    },
    /// Show the cursor and the files the next run would pick up
    Status {
        #[arg(long)]
        input: Option<String>,
    },
    /// Delete the cursor so the next run starts from the beginning
    ResetCursor,
    /// Print the schema and rows of a Parquet object in the store
    Inspect {
        /// Store key of the Parquet object
        key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    let _guard = init_logging(&config.logging.directory);
    info!(backend = ?config.store.backend, "Starting json_batch_etl");
    if let Err(e) = metrics::init() {
        warn!("Metrics disabled: {}", e);
    }

    let store = build_file_store(&config.store).context("building file store")?;
    let cursor: Arc<dyn CursorStorePort> =
        Arc::new(FileCursorStore::new(store.clone(), config.pipeline.cursor_key.clone()));
    let processor = Processor::new(store.clone(), store.clone(), cursor, build_mapper(&config.mapper));

    match cli.command {
        Commands::Run { input, output } => {
            let input = input.unwrap_or_else(|| config.pipeline.input_location.clone());
            let output = output.unwrap_or_else(|| config.pipeline.output_location.clone());
            let result = run_once(&processor, &input, &output).await;
            if let Some(handle) = metrics::handle() {
                push_metrics(&input, handle).await;
            }
            result?;
        }
        Commands::Status { input } => {
            let input = input.unwrap_or_else(|| config.pipeline.input_location.clone());
            let status = processor.status(&input).await?;

            println!("📍 Cursor: {}", status.cursor.as_deref().unwrap_or("<none>"));
            println!("📥 Pending files under '{}': {}", input, status.pending.len());
            for key in &status.pending {
                println!("   - {}", key);
            }
        }
        Commands::ResetCursor => {
            processor.reset_cursor().await.context("clearing cursor")?;
            println!("🧹 Cursor '{}' cleared", config.pipeline.cursor_key);
        }
        Commands::Inspect { key } => inspect(store.as_ref(), &key).await?,
    }

    Ok(())
}

async fn run_once(processor: &Processor, input: &str, output: &str) -> anyhow::Result<()> {
    println!("🔄 Processing '{}' into '{}'...", input, output);

    match processor.run(input, output).await? {
        RunResult::ProcessedBatch {
            file_count,
            record_count,
            cursor,
            outputs,
            ..
        } => {
            println!("\n📊 Run results:");
            println!("   Files: {}", file_count);
            println!("   Records: {}", record_count);
            println!("   Cursor: {}", cursor);
            for uploaded in &outputs {
                println!(
                    "   📦 {} ({} rows, {} bytes, sha256 {})",
                    uploaded.key, uploaded.rows, uploaded.bytes, uploaded.sha256
                );
            }
        }
        RunResult::NoNewFiles => println!("✅ No new files"),
    }
    Ok(())
}

async fn inspect(store: &dyn FileStorePort, key: &str) -> anyhow::Result<()> {
    let data = store
        .download(key)
        .await
        .with_context(|| format!("downloading {}", key))?;
    let batches = read_parquet(data).with_context(|| format!("reading {} as Parquet", key))?;

    match batches.first() {
        Some(first) => println!("{:#?}", first.schema()),
        None => {
            error!("{} holds no record batches", key);
            return Ok(());
        }
    }
    println!("{}", arrow::util::pretty::pretty_format_batches(&batches)?);
    Ok(())
}

// Transform pipeline: file selection, batch assembly, mapping and Parquet output

pub mod batch;
pub mod mappers;
pub mod parquet_out;
pub mod selection;

pub use batch::BatchBuilder;
pub use selection::{base_name, join_key, next_cursor, select_new_files};

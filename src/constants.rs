//! Shared names used across the pipeline, the stores and the CLI.

/// Only keys ending with this suffix are considered input files
pub const JSON_SUFFIX: &str = ".json";

/// Extension of every serialized output file
pub const PARQUET_EXTENSION: &str = "parquet";

/// Default key holding the cursor inside the input store
pub const DEFAULT_CURSOR_KEY: &str = "state.data";

pub const DEFAULT_INPUT_LOCATION: &str = "raw";
pub const DEFAULT_OUTPUT_LOCATION: &str = "transformed";

// Reference business mapper dataset names
pub const DEFAULT_USER_DATASET: &str = "user_data";
pub const DEFAULT_COMPANY_DATASET: &str = "company_data";

/// Separator between nested object keys once flattened into column names
pub const COLUMN_PATH_SEPARATOR: char = '.';

// Environment variables read by the Supabase store and the metrics push
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_PROJECT_REF: &str = "SUPABASE_PROJECT_REF";
pub const ENV_SUPABASE_BUCKET: &str = "SUPABASE_BUCKET";
pub const ENV_SUPABASE_PREFIX: &str = "SUPABASE_PREFIX";
pub const ENV_SUPABASE_SERVICE_ROLE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const ENV_PUSHGATEWAY_URL: &str = "ETL_PUSHGATEWAY_URL";

use thiserror::Error;

/// Errors raised by a file store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("store configuration error: {0}")]
    Config(String),

    #[error("unreadable object '{key}': {reason}")]
    InvalidData { key: String, reason: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Errors raised while turning downloaded documents into a record batch.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object record, found {0}")]
    NotARecord(String),

    #[error("could not build record batch: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Errors raised by a record mapper.
#[derive(Error, Debug)]
pub enum MapperError {
    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Pipeline stage at which a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CursorRead,
    Listing,
    Fetch,
    Parse,
    Assemble,
    Transform,
    Serialize,
    Upload,
    CursorWrite,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::CursorRead => "cursor_read",
            Stage::Listing => "listing",
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Assemble => "assemble",
            Stage::Transform => "transform",
            Stage::Serialize => "serialize",
            Stage::Upload => "upload",
            Stage::CursorWrite => "cursor_write",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed processor run. Every variant aborts the run before the cursor moves,
/// except `CursorWrite`, where outputs were uploaded but the commit failed.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("could not process files: could not read cursor: {0}")]
    CursorRead(#[source] StoreError),

    #[error("could not process files: could not list '{location}': {source}")]
    Listing {
        location: String,
        #[source]
        source: StoreError,
    },

    #[error("could not process files: could not download '{key}': {source}")]
    Fetch {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("could not process files: could not parse '{key}': {source}")]
    Parse {
        key: String,
        #[source]
        source: BatchError,
    },

    #[error("could not process files: {0}")]
    Assemble(#[source] BatchError),

    #[error("could not process files: transform failed: {0}")]
    Transform(#[source] MapperError),

    #[error("could not process files: could not write dataset '{name}' to parquet: {source}")]
    Serialize {
        name: String,
        #[source]
        source: parquet::errors::ParquetError,
    },

    #[error("could not process files: could not upload '{key}': {source}")]
    Upload {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("could not process files: outputs uploaded but cursor '{cursor}' was not committed: {source}")]
    CursorWrite {
        cursor: String,
        #[source]
        source: StoreError,
    },
}

impl ProcessError {
    pub fn stage(&self) -> Stage {
        match self {
            ProcessError::CursorRead(_) => Stage::CursorRead,
            ProcessError::Listing { .. } => Stage::Listing,
            ProcessError::Fetch { .. } => Stage::Fetch,
            ProcessError::Parse { .. } => Stage::Parse,
            ProcessError::Assemble(_) => Stage::Assemble,
            ProcessError::Transform(_) => Stage::Transform,
            ProcessError::Serialize { .. } => Stage::Serialize,
            ProcessError::Upload { .. } => Stage::Upload,
            ProcessError::CursorWrite { .. } => Stage::CursorWrite,
        }
    }

    /// True when some outputs of the failed batch may already sit in the output
    /// store. A retry re-uploads them under new timestamps.
    pub fn outputs_orphaned(&self) -> bool {
        matches!(
            self,
            ProcessError::Serialize { .. } | ProcessError::Upload { .. } | ProcessError::CursorWrite { .. }
        )
    }
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ProcessError>;

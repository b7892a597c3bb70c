use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::constants::*;
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub pipeline: PipelineConfig,
    pub mapper: MapperConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Local,
    Supabase,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Root directory of the local backend
    pub root: String,
    pub supabase: SupabaseConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Local,
            root: "data".to_string(),
            supabase: SupabaseConfig::default(),
        }
    }
}

/// Supabase Storage settings. Unset values fall back to the `SUPABASE_*`
/// environment variables; the service role key is only read from the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub project_ref: Option<String>,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            project_ref: None,
            bucket: None,
            prefix: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_location: String,
    pub output_location: String,
    pub cursor_key: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_location: DEFAULT_INPUT_LOCATION.to_string(),
            output_location: DEFAULT_OUTPUT_LOCATION.to_string(),
            cursor_key: DEFAULT_CURSOR_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapperKind {
    Business,
    Passthrough,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    pub kind: MapperKind,
    pub user_dataset: String,
    pub company_dataset: String,
    /// Dataset name used by the passthrough mapper
    pub dataset: Option<String>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            kind: MapperKind::Business,
            user_dataset: DEFAULT_USER_DATASET.to_string(),
            company_dataset: DEFAULT_COMPANY_DATASET.to_string(),
            dataset: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
        }
    }
}

impl Config {
    /// Load `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.cursor_key.trim().is_empty() {
            return Err(ConfigError::Invalid("pipeline.cursor_key must not be empty".to_string()));
        }
        if self.pipeline.cursor_key.ends_with(JSON_SUFFIX) {
            return Err(ConfigError::Invalid(format!(
                "pipeline.cursor_key must not end with {} or it would be read as input",
                JSON_SUFFIX
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.store.backend, StoreBackend::Local);
        assert_eq!(config.pipeline.cursor_key, DEFAULT_CURSOR_KEY);
        assert_eq!(config.mapper.kind, MapperKind::Business);
        assert_eq!(config.store.supabase.timeout_secs, 30);
    }

    #[test]
    fn parses_full_file() {
        let config = Config::from_toml(
            r#"
            [store]
            backend = "supabase"
            [store.supabase]
            url = "https://example.supabase.co"
            bucket = "etl"
            prefix = "prod"

            [pipeline]
            input_location = "incoming"
            output_location = "parquet"
            cursor_key = "incoming/cursor.txt"

            [mapper]
            kind = "passthrough"
            dataset = "raw_copy"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Supabase);
        assert_eq!(config.store.supabase.bucket.as_deref(), Some("etl"));
        assert_eq!(config.pipeline.input_location, "incoming");
        assert_eq!(config.mapper.kind, MapperKind::Passthrough);
        assert_eq!(config.mapper.dataset.as_deref(), Some("raw_copy"));
        assert_eq!(config.mapper.user_dataset, DEFAULT_USER_DATASET);
    }

    #[test]
    fn json_cursor_key_is_rejected() {
        let err = Config::from_toml("[pipeline]\ncursor_key = \"state.json\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = Config::load(Path::new("/definitely/not/here/config.toml")).unwrap();
        assert_eq!(config.pipeline.input_location, DEFAULT_INPUT_LOCATION);
    }
}

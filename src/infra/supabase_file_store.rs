use crate::app::ports::FileStorePort;
use crate::config::SupabaseConfig;
use crate::constants::*;
use crate::error::StoreError;
use crate::infra::local_file_store::validate_key;
use crate::pipeline::selection::join_key;
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

const LIST_PAGE_SIZE: usize = 1000;

/// Supabase Storage bucket used as an object store, optionally rooted at a
/// prefix inside the bucket.
pub struct SupabaseFileStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    prefix: String,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    name: String,
    /// Folders are returned without an id
    id: Option<String>,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl SupabaseFileStore {
    pub fn new(
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        service_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
            service_key: service_key.into(),
        })
    }

    /// Resolve settings from configuration, falling back to the `SUPABASE_*`
    /// environment variables. Either a full URL or a project ref is required.
    pub fn from_config(cfg: &SupabaseConfig) -> Result<Self, StoreError> {
        let url = match cfg.url.clone().or_else(|| env_var(ENV_SUPABASE_URL)) {
            Some(u) => u,
            None => {
                let project_ref = cfg
                    .project_ref
                    .clone()
                    .or_else(|| env_var(ENV_SUPABASE_PROJECT_REF))
                    .ok_or_else(|| StoreError::Config("missing Supabase URL or project ref".to_string()))?;
                format!("https://{}.supabase.co", project_ref)
            }
        };
        let bucket = cfg
            .bucket
            .clone()
            .or_else(|| env_var(ENV_SUPABASE_BUCKET))
            .ok_or_else(|| StoreError::Config("missing Supabase bucket".to_string()))?;
        let prefix = cfg
            .prefix
            .clone()
            .or_else(|| env_var(ENV_SUPABASE_PREFIX))
            .unwrap_or_default();
        let key = env_var(ENV_SUPABASE_SERVICE_ROLE_KEY)
            .ok_or_else(|| StoreError::Config(format!("{} is not set", ENV_SUPABASE_SERVICE_ROLE_KEY)))?;

        Self::new(url, bucket, prefix, key, Duration::from_secs(cfg.timeout_secs))
    }

    /// Path of `key` inside the bucket
    fn object_path(&self, key: &str) -> Result<String, StoreError> {
        validate_key(key)?;
        let key = key.trim_matches('/');
        Ok(match (self.prefix.is_empty(), key.is_empty()) {
            (true, _) => key.to_string(),
            (false, true) => self.prefix.clone(),
            (false, false) => format!("{}/{}", self.prefix, key),
        })
    }

    fn object_url(&self, key: &str) -> Result<String, StoreError> {
        Ok(format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            self.object_path(key)?
        ))
    }

    fn list_url(&self) -> String {
        format!("{}/storage/v1/object/list/{}", self.base_url, self.bucket)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.service_key))
            .header("apikey", self.service_key.clone())
    }

    async fn check(key: &str, resp: Response) -> Result<Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(response_error(key, status, body))
    }
}

/// Map a non-success response to a store error. Supabase reports a missing
/// object either as 404 or as 400 with a not-found body.
fn response_error(key: &str, status: StatusCode, body: String) -> StoreError {
    let missing = status == StatusCode::NOT_FOUND
        || (status == StatusCode::BAD_REQUEST
            && (body.contains("not_found") || body.contains("Object not found")));
    if missing {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Backend {
            status: status.as_u16(),
            message: body,
        }
    }
}

#[async_trait]
impl FileStorePort for SupabaseFileStore {
    #[instrument(level = "debug", skip(self), fields(bucket = %self.bucket))]
    async fn list(&self, location: &str) -> Result<Vec<String>, StoreError> {
        let folder = self.object_path(location)?;
        let mut keys = Vec::new();
        let mut offset = 0;
        loop {
            let body = json!({
                "prefix": folder,
                "limit": LIST_PAGE_SIZE,
                "offset": offset,
                "sortBy": {"column": "name", "order": "asc"},
            });
            let resp = self
                .authorized(self.client.post(self.list_url()))
                .json(&body)
                .send()
                .await?;
            let page: Vec<ListEntry> = Self::check(location, resp).await?.json().await?;
            let page_len = page.len();
            keys.extend(
                page.into_iter()
                    .filter(|e| e.id.is_some())
                    .map(|e| join_key(location, &e.name)),
            );
            if page_len < LIST_PAGE_SIZE {
                break;
            }
            offset += page_len;
        }
        debug!("Listed {} objects under '{}'", keys.len(), folder);
        Ok(keys)
    }

    #[instrument(level = "debug", skip(self), fields(bucket = %self.bucket))]
    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let resp = self
            .authorized(self.client.get(self.object_url(key)?))
            .send()
            .await?;
        let bytes = Self::check(key, resp).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    #[instrument(level = "debug", skip(self, data), fields(bucket = %self.bucket, bytes = data.len()))]
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let resp = self
            .authorized(self.client.post(self.object_url(key)?))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header("x-upsert", "true")
            .body(data)
            .send()
            .await?;
        Self::check(key, resp).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(bucket = %self.bucket))]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let resp = self
            .authorized(self.client.delete(self.object_url(key)?))
            .send()
            .await?;
        Self::check(key, resp).await?;
        Ok(())
    }
}

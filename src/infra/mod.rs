pub mod file_cursor_store;
pub mod in_memory_file_store;
pub mod local_file_store;
pub mod supabase_file_store;

pub use file_cursor_store::FileCursorStore;
pub use in_memory_file_store::InMemoryFileStore;
pub use local_file_store::LocalFileStore;
pub use supabase_file_store::SupabaseFileStore;

use crate::app::ports::FileStorePort;
use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreError;
use std::sync::Arc;
use tracing::info;

/// Build the file store selected in configuration
pub fn build_file_store(config: &StoreConfig) -> Result<Arc<dyn FileStorePort>, StoreError> {
    match config.backend {
        StoreBackend::Local => {
            info!("Using local file store at {}", config.root);
            Ok(Arc::new(LocalFileStore::new(&config.root)))
        }
        StoreBackend::Supabase => {
            let store = SupabaseFileStore::from_config(&config.supabase)?;
            info!("Using Supabase storage");
            Ok(Arc::new(store))
        }
    }
}

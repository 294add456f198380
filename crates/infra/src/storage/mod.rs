//! Token store implementations

pub mod file;
pub mod memory;

use std::sync::Arc;

use tokenwarden_core::TokenStore;
use tokenwarden_domain::{StoreError, StoreKind, StoreSettings};

pub use file::FileTokenStore;
pub use memory::InMemoryTokenStore;

/// Build the store selected by `settings`.
pub async fn open_store(settings: &StoreSettings) -> Result<Arc<dyn TokenStore>, StoreError> {
    match settings.kind {
        StoreKind::Memory => Ok(Arc::new(InMemoryTokenStore::new())),
        StoreKind::File => {
            let path = settings
                .path
                .clone()
                .ok_or_else(|| StoreError::backend("store.path is required for the file store"))?;
            Ok(Arc::new(FileTokenStore::open(path).await?))
        }
    }
}

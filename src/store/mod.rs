//! Persistence layer: libSQL-backed storage plus a snapshot-backed demo store.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

use std::sync::Arc;

use tracing::{info, warn};

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use traits::Store;

use crate::config::StoreConfig;
use crate::error::DatabaseError;

/// Open the store selected by configuration.
///
/// A configured database path selects libSQL; otherwise demo mode keeps a
/// JSON snapshot so data survives between runs.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn Store>, DatabaseError> {
    match config {
        StoreConfig::LibSql { path } => {
            let store = LibSqlStore::new_local(path).await?;
            info!(path = %path.display(), "Using libSQL store");
            Ok(Arc::new(store))
        }
        StoreConfig::Local { path } => {
            let store = MemoryStore::open(path).await?;
            warn!(path = %path.display(), "No database configured, running in demo mode");
            Ok(Arc::new(store))
        }
    }
}

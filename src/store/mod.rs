pub mod memory;
pub mod queries;
pub mod remote;
pub mod sqlite;

use crate::config::{Config, StoreKind};
use crate::lead::{Lead, NewLead};
use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub use memory::MemoryStore;
pub use remote::RemoteStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("This email is already registered: {email}")]
    Duplicate { email: String },
    #[error("lead store unavailable: {0:#}")]
    Unavailable(anyhow::Error),
}

impl From<anyhow::Error> for StoreError {
    fn from(value: anyhow::Error) -> Self {
        Self::Unavailable(value)
    }
}

/// Backing collection for leads.
///
/// Implementations own the uniqueness of normalized emails and stamp
/// `created_at` themselves; callers only hand over validated input.
pub trait LeadStore: Send + Sync {
    fn insert(&self, lead: NewLead) -> Result<Lead, StoreError>;

    fn list_all(&self) -> Result<Vec<Lead>, StoreError>;

    fn backend_name(&self) -> &'static str;
}

pub fn open(config: &Config) -> Result<Arc<dyn LeadStore>> {
    let store: Arc<dyn LeadStore> = match config.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Sqlite => Arc::new(SqliteStore::open(&config.db_path)?),
        StoreKind::Remote => Arc::new(RemoteStore::from_config(config)?),
    };

    info!(backend = store.backend_name(), "lead store ready");
    Ok(store)
}

use super::config::{ServerConfig, StoreBackend};
use hss_provision::{MemoryStore, SqliteStore, SubscriberService, SubscriberStore};
use std::sync::Arc;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: SubscriberService,
    /// Page size for list requests without a `limit`.
    pub default_page_size: usize,
    pub version: &'static str,
}

impl AppState {
    pub fn new(service: SubscriberService, default_page_size: usize) -> Self {
        Self {
            service,
            default_page_size,
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn from_config(store: Arc<dyn SubscriberStore>, config: &ServerConfig) -> Self {
        let service = SubscriberService::new(store).with_store_timeout(config.store_timeout);
        Self::new(service, config.default_page_size)
    }
}

/// Builds the (not yet connected) store selected by `config`.
pub fn open_store(config: &ServerConfig) -> Arc<dyn SubscriberStore> {
    match config.store {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Sqlite => Arc::new(SqliteStore::new(&config.sqlite_path)),
    }
}

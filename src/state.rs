//! Shared application state
//!
//! One `AppState` is constructed at startup and handed to every handler
//! through axum's `State` extractor. Debate invocations share nothing
//! mutable except the store, whose pool serializes writes.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

use crate::config::AppConfig;
use crate::search::{SearchProvider, TavilyClient};
use crate::storage::DebateStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: DebateStore,
    pub search: Option<Arc<dyn SearchProvider>>,
    started_at: Instant,
}

impl AppState {
    /// Connect the database, create the schema, and wire up optional
    /// search.
    pub async fn init(config: AppConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;

        let store = DebateStore::new(pool);
        store.init().await?;
        info!(database = %config.database_url, "database ready");

        let search: Option<Arc<dyn SearchProvider>> = config
            .tavily_api_key
            .as_deref()
            .map(|key| Arc::new(TavilyClient::new(key)) as Arc<dyn SearchProvider>);

        Ok(Self {
            config: Arc::new(config),
            store,
            search,
            started_at: Instant::now(),
        })
    }

    /// Seconds since startup, for the health endpoint.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

use std::sync::Arc;

use ingestion::{IngestionConfig, IngestionService, PanelClient};
use matching_engine::MatchEngine;
use stats::StatsService;
use store::MemoryStore;
use types::errors::ReconError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub engine: Arc<MatchEngine<MemoryStore>>,
    pub ingestion: Arc<IngestionService<MemoryStore, PanelClient>>,
    pub stats: Arc<StatsService<MemoryStore>>,
}

impl AppState {
    pub fn new(config: IngestionConfig) -> Result<Self, ReconError> {
        let store = Arc::new(MemoryStore::new());
        let client = PanelClient::new(config.clone())?;
        Ok(Self {
            engine: Arc::new(MatchEngine::new(store.clone())),
            ingestion: Arc::new(IngestionService::new(store.clone(), client, config)),
            stats: Arc::new(StatsService::new(store.clone())),
            store,
        })
    }
}

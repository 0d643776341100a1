use std::sync::Arc;

use tracing::info;

use super::{
    config::Config,
    orders::OrderManager,
    store::{JsonStore, MemoryStore, Store},
};

pub struct State {
    pub config: Config,
    pub orders: OrderManager,
}

impl State {
    pub fn new() -> Arc<Self> {
        let config = Config::load();

        let store: Arc<dyn Store> = match &config.data_file {
            Some(path) => {
                info!("Using flat-file order store at {}", path.display());
                Arc::new(JsonStore::new(path))
            }
            None => Arc::new(MemoryStore::default()),
        };

        Arc::new(Self {
            orders: OrderManager::new(store),
            config,
        })
    }
}

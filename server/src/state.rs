use std::sync::Arc;

use crate::backend::DataBackend;
use crate::config::Config;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub backend: DataBackend,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(backend: DataBackend, config: Config) -> Self {
        Self {
            backend,
            config: Arc::new(config),
        }
    }
}

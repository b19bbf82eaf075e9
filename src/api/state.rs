use std::sync::Arc;

use crate::global::{config::AppConfig, database::DocumentStore};

/// Application state shared across API handlers
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<AppConfig>,
    /// `None` when MongoDB is disabled in configuration
    pub store: Option<Arc<DocumentStore>>,
}

impl ApiState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config, store: None }
    }

    pub fn with_store(mut self, store: Arc<DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }
}

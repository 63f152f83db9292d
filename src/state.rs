use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{config::Settings, generation::GenerationClient, store::CourseStore};

pub type SharedStore = Arc<RwLock<CourseStore>>;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub generator: GenerationClient,
}

impl AppState {
    pub fn new(generator: GenerationClient) -> Self {
        Self {
            store: Arc::new(RwLock::new(CourseStore::new())),
            generator,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(GenerationClient::from_settings(settings))
    }
}

use std::sync::Arc;

use crate::{auth::jwt::JwtService, config::AppConfig, store::TaskStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TaskStore>,
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(store: Arc<dyn TaskStore>, config: AppConfig, jwt: JwtService) -> Self {
        Self {
            store,
            config: Arc::new(config),
            jwt,
        }
    }

    pub fn store(&self) -> &dyn TaskStore {
        self.store.as_ref()
    }
}

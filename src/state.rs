use std::sync::Arc;

use crate::{config::Config, services::ownership::OwnershipPolicy};
use axum::extract::FromRef;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub policy: Arc<dyn OwnershipPolicy>,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn OwnershipPolicy> {
    fn from_ref(state: &AppState) -> Self {
        state.policy.clone()
    }
}

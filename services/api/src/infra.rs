use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use shelter_core::config::StoreConfig;
use shelter_core::error::AppError;
use shelter_core::workflows::adoption::{
    EntityStore, InMemoryStore, SqliteStore, TransitionCoordinator,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

use crate::routes::with_adoption_routes;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Build the adoption API over the store selected by configuration.
pub(crate) fn adoption_api(config: &StoreConfig) -> Result<Router, AppError> {
    match &config.database_path {
        Some(path) => {
            let store = SqliteStore::open(path, config.lock_timeout)?;
            info!(path = %store.path().display(), "using sqlite entity store");
            Ok(with_adoption_routes(coordinator(store)))
        }
        None => {
            info!("using in-memory entity store; records are lost on restart");
            let store = InMemoryStore::with_lock_timeout(config.lock_timeout);
            Ok(with_adoption_routes(coordinator(store)))
        }
    }
}

pub(crate) fn coordinator<S>(store: S) -> Arc<TransitionCoordinator<S>>
where
    S: EntityStore + 'static,
{
    Arc::new(TransitionCoordinator::new(Arc::new(store)))
}

use std::sync::Arc;

use axum::Router;

use crate::{Config, ReadingStore};

mod health;
mod ingest;
mod stations;

// ---

/// Shared state handed to every handler.
pub type AppState = (Arc<dyn ReadingStore>, Config);

pub fn router(store: Arc<dyn ReadingStore>, config: Config) -> Router {
    // ---
    Router::new()
        .merge(ingest::router())
        .merge(stations::router())
        .merge(health::router())
        .with_state((store, config))
}

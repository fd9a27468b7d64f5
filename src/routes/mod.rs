use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::{IngestSettings, ReadingStore};

mod submit;

// ---

pub fn router(store: Arc<dyn ReadingStore>, settings: IngestSettings) -> Router {
    // ---
    Router::new()
        .merge(submit::router())
        .layer(TraceLayer::new_for_http())
        .with_state((store, settings))
}

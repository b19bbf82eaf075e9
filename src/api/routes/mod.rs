pub mod documents;
pub mod health;

use axum::{
    Router, routing::{get, post}
};

use crate::api::state::ApiState;

/// Create the main API router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))

        // Document routes
        .route("/api/documents", post(documents::insert_document))
        .route("/api/documents/batch", post(documents::insert_documents))
        .route("/api/documents/find", post(documents::find_documents))
        .route("/api/documents/update", post(documents::update_documents))
        .route("/api/documents/delete", post(documents::delete_documents))
        .route("/api/documents/count", get(documents::count_documents))

        .with_state(state)
}

use std::future::IntoFuture;

use axum::{extract::State, Json};
use mongodb::bson::doc;
use serde::Serialize;
use tracing::warn;

use crate::api::state::ApiState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    database: DatabaseHealth,
}

#[derive(Serialize)]
struct DatabaseHealth {
    enabled: bool,
    collection: Option<String>,
    /// Result of a ping, absent when the database is disabled
    reachable: Option<bool>,
}

/// Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let database = match state.store.as_ref() {
        Some(store) => {
            let ping = store.database().run_command(doc! { "ping": 1 });
            let reachable = match store.operation_timeout() {
                Some(after) => matches!(tokio::time::timeout(after, ping.into_future()).await, Ok(Ok(_))),
                None => ping.await.is_ok(),
            };
            if !reachable {
                warn!(collection = %store.collection().name(), "MongoDB ping failed during health check");
            }

            DatabaseHealth {
                enabled: true,
                collection: Some(store.collection().name().to_string()),
                reachable: Some(reachable),
            }
        }
        None => DatabaseHealth {
            enabled: false,
            collection: None,
            reachable: None,
        },
    };

    let status = match database.reachable {
        Some(false) => "degraded",
        _ => "healthy",
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    })
}

use std::collections::BTreeMap;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use futures::{StreamExt, TryStreamExt};
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::UpdateModifications;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, error, warn};

use crate::api::state::ApiState;
use crate::global::{database::DocumentStore, error::DatabaseError};

// ========================================================================
// Request/Response Types
// ========================================================================

#[derive(Debug, Deserialize)]
pub struct InsertManyRequest {
    pub documents: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct FindRequest {
    #[serde(default = "empty_object")]
    pub filter: Value,
    pub projection: Option<Value>,
    /// Stop after this many documents
    pub limit: Option<usize>,
    /// Return at most the first match
    #[serde(default)]
    pub one: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub filter: Value,
    /// Update document, or an array of them for a pipeline update
    pub update: Value,
    #[serde(default)]
    pub many: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub filter: Value,
    #[serde(default)]
    pub many: bool,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

#[derive(Serialize)]
pub struct InsertOneResponse {
    pub inserted_id: Value,
}

#[derive(Serialize)]
pub struct InsertManyResponse {
    pub inserted_ids: Vec<Value>,
}

#[derive(Serialize)]
pub struct FindResponse {
    pub count: usize,
    pub documents: Vec<Value>,
}

#[derive(Serialize)]
pub struct UpdateResponse {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Value>,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted_count: u64,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// ========================================================================
// Handlers
// ========================================================================

/// Insert a single document
/// POST /api/documents
/// Body: { "name": "widget", "qty": 3 }
pub async fn insert_document(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<InsertOneResponse>), ApiError> {
    let store = require_store(&state)?;
    let document = to_document(body, "document")?;

    let result = store.insert_one(document).await.map_err(database_error)?;
    info!(inserted_id = %result.inserted_id, "API request: inserted document");

    Ok((
        StatusCode::CREATED,
        Json(InsertOneResponse {
            inserted_id: result.inserted_id.into_relaxed_extjson(),
        }),
    ))
}

/// Insert several documents in order
/// POST /api/documents/batch
/// Body: { "documents": [{ "name": "a" }, { "name": "b" }] }
pub async fn insert_documents(
    State(state): State<ApiState>,
    Json(request): Json<InsertManyRequest>,
) -> Result<(StatusCode, Json<InsertManyResponse>), ApiError> {
    info!(count = request.documents.len(), "API request: insert documents");

    if request.documents.is_empty() {
        return Err(bad_request("No documents provided".to_string()));
    }

    let store = require_store(&state)?;
    let documents = request
        .documents
        .into_iter()
        .map(|value| to_document(value, "document"))
        .collect::<Result<Vec<_>, _>>()?;

    let result = store.insert_many(documents).await.map_err(database_error)?;

    // inserted_ids is keyed by input position
    let ordered: BTreeMap<usize, Bson> = result.inserted_ids.into_iter().collect();

    Ok((
        StatusCode::CREATED,
        Json(InsertManyResponse {
            inserted_ids: ordered.into_values().map(Bson::into_relaxed_extjson).collect(),
        }),
    ))
}

/// Find documents matching a filter
/// POST /api/documents/find
/// Body: { "filter": { "qty": { "$gt": 1 } }, "projection": { "name": 1 }, "limit": 10 }
pub async fn find_documents(
    State(state): State<ApiState>,
    Json(request): Json<FindRequest>,
) -> Result<Json<FindResponse>, ApiError> {
    let store = require_store(&state)?;
    let filter = to_document(request.filter, "filter")?;
    let projection = request
        .projection
        .map(|value| to_document(value, "projection"))
        .transpose()?;

    let documents = if request.one {
        store
            .find_one(filter, projection)
            .await
            .map_err(database_error)?
            .into_iter()
            .collect()
    } else {
        let cursor = store.find(filter, projection).await.map_err(database_error)?;
        drain_cursor(store, cursor, request.limit).await?
    };

    let documents: Vec<Value> = documents
        .into_iter()
        .map(|document| Bson::Document(document).into_relaxed_extjson())
        .collect();

    Ok(Json(FindResponse {
        count: documents.len(),
        documents,
    }))
}

/// Update one or all matching documents
/// POST /api/documents/update
/// Body: { "filter": { "name": "a" }, "update": { "$set": { "qty": 1 } }, "many": true }
pub async fn update_documents(
    State(state): State<ApiState>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let store = require_store(&state)?;
    let filter = to_document(request.filter, "filter")?;
    let update = to_update(request.update)?;

    let result = if request.many {
        store.update_many(filter, update).await
    } else {
        store.update_one(filter, update).await
    }
    .map_err(database_error)?;

    info!(
        many = request.many,
        matched = result.matched_count,
        modified = result.modified_count,
        "API request: updated documents"
    );

    Ok(Json(UpdateResponse {
        matched_count: result.matched_count,
        modified_count: result.modified_count,
        upserted_id: result.upserted_id.map(Bson::into_relaxed_extjson),
    }))
}

/// Delete one or all matching documents
/// POST /api/documents/delete
/// Body: { "filter": { "name": "a" }, "many": false }
pub async fn delete_documents(
    State(state): State<ApiState>,
    Json(request): Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let store = require_store(&state)?;
    let filter = to_document(request.filter, "filter")?;

    let result = if request.many {
        store.delete_many(filter).await
    } else {
        store.delete_one(filter).await
    }
    .map_err(database_error)?;

    info!(many = request.many, deleted = result.deleted_count, "API request: deleted documents");

    Ok(Json(DeleteResponse {
        deleted_count: result.deleted_count,
    }))
}

/// Count every document in the collection
/// GET /api/documents/count
pub async fn count_documents(
    State(state): State<ApiState>,
) -> Result<Json<CountResponse>, ApiError> {
    let store = require_store(&state)?;

    // Not part of the CRUD surface, goes through the raw collection handle
    let count = with_deadline(
        store.operation_timeout(),
        "count_documents",
        store.collection().count_documents(doc! {}).into_future(),
    )
    .await?;

    Ok(Json(CountResponse { count }))
}

// ========================================================================
// Helpers
// ========================================================================

fn require_store(state: &ApiState) -> Result<&Arc<DocumentStore>, ApiError> {
    state.store.as_ref().ok_or_else(|| {
        error!("Document store not available");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "MongoDB is not enabled".to_string(),
            }),
        )
    })
}

async fn drain_cursor(
    store: &DocumentStore,
    cursor: mongodb::Cursor<Document>,
    limit: Option<usize>,
) -> Result<Vec<Document>, ApiError> {
    let collect = cursor
        .take(limit.unwrap_or(usize::MAX))
        .try_collect::<Vec<Document>>();

    with_deadline(store.operation_timeout(), "find", collect).await
}

/// Run a driver call made outside the store under the same operation deadline
async fn with_deadline<T, F>(deadline: Option<Duration>, op: &'static str, call: F) -> Result<T, ApiError>
where
    F: Future<Output = mongodb::error::Result<T>>,
{
    let result = match deadline {
        Some(after) => tokio::time::timeout(after, call)
            .await
            .map_err(|_| database_error(DatabaseError::Timeout { op, after }))?,
        None => call.await,
    };

    result.map_err(|source| database_error(DatabaseError::Operation { op, source }))
}

/// Parse MongoDB extended JSON into a document
fn to_document(value: Value, field: &str) -> Result<Document, ApiError> {
    match Bson::try_from(value) {
        Ok(Bson::Document(document)) => Ok(document),
        Ok(_) => Err(bad_request(format!("{} must be a JSON object", field))),
        Err(e) => Err(bad_request(format!("invalid {}: {}", field, e))),
    }
}

fn to_update(value: Value) -> Result<UpdateModifications, ApiError> {
    match value {
        Value::Array(stages) => {
            let pipeline = stages
                .into_iter()
                .map(|stage| to_document(stage, "update stage"))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(UpdateModifications::Pipeline(pipeline))
        }
        other => Ok(UpdateModifications::Document(to_document(other, "update")?)),
    }
}

fn bad_request(message: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message }))
}

fn database_error(e: DatabaseError) -> ApiError {
    let status = match &e {
        DatabaseError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        DatabaseError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!(error = %e, retryable = e.is_retryable(), "Database operation failed");
    } else {
        warn!(error = %e, "Rejected database request");
    }

    (status, Json(ErrorResponse { error: e.to_string() }))
}

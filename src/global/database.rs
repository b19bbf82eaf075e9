use std::future::IntoFuture;
use std::time::Duration;

use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, ReadPreference, SelectionCriteria, UpdateModifications};
use mongodb::results::{DeleteResult, InsertManyResult, InsertOneResult, UpdateResult};
use mongodb::{Client, Collection, Cursor, Database};
use tracing::{debug, error, info};

use super::config::DatabaseConfig;
use super::error::DatabaseError;

/// Connection to one MongoDB collection.
///
/// Every CRUD call goes straight to the driver against the collection named in
/// the configuration. The driver client is pooled and safe to share, so the
/// store is usually held in an `Arc` and used from many tasks at once.
pub struct DocumentStore {
    client: Client,
    database: Database,
    collection: Collection<Document>,
    operation_timeout: Option<Duration>,
}

impl DocumentStore {
    /// Connect and ping the primary, both within the configured connect timeout.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let uri = config.connection_uri();
        let display_uri = config.redacted_uri();
        let budget = config.connect_timeout();

        info!(
            uri = %display_uri,
            database = %config.name,
            collection = %config.collection_name(),
            "Connecting to MongoDB"
        );

        let client = tokio::time::timeout(budget, Self::open_client(&uri, budget))
            .await
            .map_err(|_| {
                error!(uri = %display_uri, timeout = ?budget, "MongoDB connection timed out");
                DatabaseError::ConnectTimeout(budget)
            })?
            .map_err(|e| {
                error!(uri = %display_uri, error = %e, "MongoDB connection failed");
                DatabaseError::Connection(e)
            })?;

        let database = client.database(&config.name);
        let collection = database.collection::<Document>(config.collection_name());

        info!(database = %config.name, collection = %collection.name(), "Connected to MongoDB");

        Ok(Self {
            client,
            database,
            collection,
            operation_timeout: config.operation_timeout(),
        })
    }

    async fn open_client(uri: &str, budget: Duration) -> mongodb::error::Result<Client> {
        let mut options = ClientOptions::parse(uri).await?;
        options.connect_timeout.get_or_insert(budget);
        options.server_selection_timeout.get_or_insert(budget);

        let client = Client::with_options(options)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .selection_criteria(SelectionCriteria::ReadPreference(ReadPreference::Primary))
            .await?;

        Ok(client)
    }

    // ========================================================================
    // Advanced access
    // ========================================================================

    /// Raw driver client, for queries the CRUD surface does not cover
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Raw handle to the configured collection
    pub fn collection(&self) -> &Collection<Document> {
        &self.collection
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout
    }

    /// Shut the driver client down. Consumes the store, nothing can run after it.
    pub async fn close(self) -> Result<(), DatabaseError> {
        info!(collection = %self.collection.name(), "Closing MongoDB connection");
        let client = self.client.clone();
        self.run("close", async move {
            client.shutdown().await;
            Ok::<_, mongodb::error::Error>(())
        })
        .await
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    pub async fn insert_one(&self, document: Document) -> Result<InsertOneResult, DatabaseError> {
        self.run("insert_one", self.collection.insert_one(document)).await
    }

    /// Insert in order. The first failing document stops the batch and the
    /// ones before it stay inserted.
    pub async fn insert_many(&self, documents: Vec<Document>) -> Result<InsertManyResult, DatabaseError> {
        if documents.is_empty() {
            return Err(DatabaseError::InvalidInput("insert_many needs at least one document".to_string()));
        }

        self.run("insert_many", self.collection.insert_many(documents).ordered(true)).await
    }

    /// Lazy cursor over every match. Without a projection all fields come back.
    pub async fn find(
        &self,
        filter: Document,
        projection: Option<Document>,
    ) -> Result<Cursor<Document>, DatabaseError> {
        let mut action = self.collection.find(filter);
        if let Some(projection) = projection {
            action = action.projection(projection);
        }
        self.run("find", action).await
    }

    pub async fn find_one(
        &self,
        filter: Document,
        projection: Option<Document>,
    ) -> Result<Option<Document>, DatabaseError> {
        let mut action = self.collection.find_one(filter);
        if let Some(projection) = projection {
            action = action.projection(projection);
        }
        self.run("find_one", action).await
    }

    /// Update at most one matching document
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, DatabaseError> {
        self.run("update_one", self.collection.update_one(filter, update)).await
    }

    /// Update every matching document. `update` is an update document or a
    /// pipeline of them.
    pub async fn update_many(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, DatabaseError> {
        self.run("update_many", self.collection.update_many(filter, update)).await
    }

    /// Delete at most one document, even when several match
    pub async fn delete_one(&self, filter: Document) -> Result<DeleteResult, DatabaseError> {
        self.run("delete_one", self.collection.delete_one(filter)).await
    }

    pub async fn delete_many(&self, filter: Document) -> Result<DeleteResult, DatabaseError> {
        self.run("delete_many", self.collection.delete_many(filter)).await
    }

    /// Drive one driver call under the operation deadline
    async fn run<T, F>(&self, op: &'static str, action: F) -> Result<T, DatabaseError>
    where
        F: IntoFuture<Output = mongodb::error::Result<T>>,
    {
        debug!(op, collection = %self.collection.name(), "MongoDB operation");

        let result = match self.operation_timeout {
            Some(after) => tokio::time::timeout(after, action.into_future())
                .await
                .map_err(|_| DatabaseError::Timeout { op, after })?,
            None => action.await,
        };

        result.map_err(|source| DatabaseError::Operation { op, source })
    }
}

//! Stored collection projections.

use futures::future::try_join_all;

use crate::db::{DocumentStore, StorePath};
use crate::errors::AppError;
use crate::models::StoredCollection;
use crate::schema;

#[derive(Clone)]
pub struct StoredCollectionsRepository {
    store: DocumentStore,
}

impl StoredCollectionsRepository {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Set every projection, one transaction per batch of at most the store's operation limit.
    pub async fn set_collections(&self, collections: &[StoredCollection]) -> Result<(), AppError> {
        for batch in collections.chunks(self.store.operations_limit()) {
            let mut tx = self.store.begin().await?;
            for collection in batch {
                schema::ensure_serializable(collection)?;
                let data = serde_json::to_value(collection)?;
                tx.set_doc(&StorePath::Collections, &collection.id, &data).await?;
            }
            tx.commit().await?;
        }

        tracing::info!(count = collections.len(), "Stored collections set");
        Ok(())
    }

    /// Delete collections together with their memo sub-collections.
    pub async fn delete_collections_by_ids(&self, ids: &[String]) -> Result<(), AppError> {
        for batch in ids.chunks(self.store.operations_limit()) {
            let mut tx = self.store.begin().await?;
            for id in batch {
                let deleted = tx.delete_doc_recursively(&StorePath::Collections, id).await?;
                tracing::debug!(collection_id = %id, documents = deleted, "Collection deleted recursively");
            }
            tx.commit().await?;
        }

        tracing::info!(count = ids.len(), "Stored collections deleted");
        Ok(())
    }

    /// Fetch stored projections by id. Ids with no stored document are skipped.
    pub async fn get_collections_by_ids(&self, ids: &[String]) -> Result<Vec<StoredCollection>, AppError> {
        let fetches = ids
            .iter()
            .map(|id| self.store.get_doc(&StorePath::Collections, id));
        let raw_collections = try_join_all(fetches).await?;

        raw_collections
            .into_iter()
            .flatten()
            .map(schema::parse_value::<StoredCollection>)
            .collect()
    }
}

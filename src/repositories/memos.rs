//! Memo sub-collections of stored collections.

use std::collections::BTreeMap;

use crate::db::{DocumentStore, StorePath};
use crate::errors::AppError;
use crate::models::Memo;
use crate::schema;

#[derive(Clone)]
pub struct MemosRepository {
    store: DocumentStore,
}

impl MemosRepository {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Set memos under their parent collections, batching writes per transaction.
    pub async fn set_memos(&self, memos_per_collection: &BTreeMap<String, Vec<Memo>>) -> Result<(), AppError> {
        let writes: Vec<(&String, &Memo)> = memos_per_collection
            .iter()
            .flat_map(|(collection_id, memos)| memos.iter().map(move |memo| (collection_id, memo)))
            .collect();

        for batch in writes.chunks(self.store.operations_limit()) {
            let mut tx = self.store.begin().await?;
            for (collection_id, memo) in batch {
                schema::ensure_serializable(*memo)?;
                let path = StorePath::CollectionMemos(collection_id.to_string());
                tx.set_doc(&path, &memo.id, &serde_json::to_value(memo)?).await?;
            }
            tx.commit().await?;
        }

        tracing::info!(count = writes.len(), "Memos set");
        Ok(())
    }

    /// Delete memos by id from their parent collections, batching deletes per transaction.
    pub async fn remove_memos_by_ids(&self, ids_per_collection: &BTreeMap<String, Vec<String>>) -> Result<(), AppError> {
        let deletions: Vec<(&String, &String)> = ids_per_collection
            .iter()
            .flat_map(|(collection_id, ids)| ids.iter().map(move |id| (collection_id, id)))
            .collect();

        for batch in deletions.chunks(self.store.operations_limit()) {
            let mut tx = self.store.begin().await?;
            for (collection_id, memo_id) in batch {
                let path = StorePath::CollectionMemos(collection_id.to_string());
                tx.delete_doc(&path, memo_id).await?;
            }
            tx.commit().await?;
        }

        tracing::info!(count = deletions.len(), "Memos removed");
        Ok(())
    }

    /// Every memo currently stored under a collection, validated against the memo schema.
    pub async fn get_all_memos(&self, collection_id: &str) -> Result<Vec<Memo>, AppError> {
        let path = StorePath::CollectionMemos(collection_id.to_string());
        let raw_memos = self.store.get_collection(&path, &[]).await?;

        raw_memos.into_iter().map(schema::parse_value::<Memo>).collect()
    }
}

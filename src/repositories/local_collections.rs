//! Local collection files.

use futures::future::try_join_all;

use crate::errors::AppError;
use crate::gateways::FileSystemGateway;
use crate::models::LocalCollection;
use crate::schema;

/// Reads `<id>.json` collection documents from the collections directory.
#[derive(Clone)]
pub struct LocalCollectionsRepository {
    fs: FileSystemGateway,
}

impl LocalCollectionsRepository {
    /// `fs` must be rooted at the collections directory.
    pub fn new(fs: FileSystemGateway) -> Self {
        Self { fs }
    }

    /// Load and validate every collection in `ids`, concurrently.
    ///
    /// The result keeps the order of `ids`. Any read, parse or schema failure aborts
    /// the whole batch.
    pub async fn get_collections_by_ids(&self, ids: &[String]) -> Result<Vec<LocalCollection>, AppError> {
        let loads = ids.iter().map(|id| self.get_collection_by_id(id));
        try_join_all(loads).await
    }

    /// Ids of every collection file in the directory, sorted.
    pub async fn list_ids(&self) -> Result<Vec<String>, AppError> {
        let files = self.fs.list_files(".", "json").await?;
        Ok(files
            .into_iter()
            .filter_map(|file| file.strip_suffix(".json").map(str::to_string))
            .collect())
    }

    /// Load and validate a single collection from `<id>.json`.
    pub async fn get_collection_by_id(&self, id: &str) -> Result<LocalCollection, AppError> {
        let raw = self.fs.read_file_as_string(format!("{}.json", id)).await?;
        let collection: LocalCollection = schema::parse_str(&raw)?;
        tracing::debug!(collection_id = %id, memos = collection.memos.len(), "Loaded local collection");
        Ok(collection)
    }
}

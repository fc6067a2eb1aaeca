//! Transactional document store.
//!
//! Documents are addressed by a [`StorePath`] (the collection they belong to) and
//! an id. Operations either auto-commit on the [`DocumentStore`] or are bound to a
//! [`StoreTransaction`] handle obtained from [`DocumentStore::begin`].

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, Sqlite, SqliteExecutor, SqlitePool};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::errors::AppError;

/// Logical location of a collection of documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(dead_code)]
pub enum StorePath {
    /// `collections`
    Collections,
    /// `collections/{collection_id}/memos`
    CollectionMemos(String),
    /// `collection_categories`
    CollectionCategories,
    /// `users/{user_id}/collections`
    UserCollections(String),
    /// `users/{user_id}/collections/{collection_id}/memos`
    UserCollectionMemos {
        user_id: String,
        collection_id: String,
    },
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorePath::Collections => write!(f, "collections"),
            StorePath::CollectionMemos(collection_id) => write!(f, "collections/{}/memos", collection_id),
            StorePath::CollectionCategories => write!(f, "collection_categories"),
            StorePath::UserCollections(user_id) => write!(f, "users/{}/collections", user_id),
            StorePath::UserCollectionMemos {
                user_id,
                collection_id,
            } => write!(f, "users/{}/collections/{}/memos", user_id, collection_id),
        }
    }
}

/// Comparison operator of a [`QueryFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Comparison {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    ArrayContains,
}

/// A where-clause applied to documents read by [`DocumentStore::get_collection`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    /// Field name; nested fields are separated by dots
    pub field: String,
    pub comparison: Comparison,
    pub value: Value,
}

impl QueryFilter {
    #[allow(dead_code)]
    pub fn new(field: impl Into<String>, comparison: Comparison, value: Value) -> Self {
        Self {
            field: field.into(),
            comparison,
            value,
        }
    }

    fn matches(&self, document: &Value) -> bool {
        let pointer = format!("/{}", self.field.replace('.', "/"));
        let Some(actual) = document.pointer(&pointer) else {
            return false;
        };

        match self.comparison {
            Comparison::Equal => actual == &self.value,
            Comparison::NotEqual => actual != &self.value,
            Comparison::LessThan => compare(actual, &self.value) == Some(Ordering::Less),
            Comparison::LessThanOrEqual => {
                matches!(compare(actual, &self.value), Some(Ordering::Less | Ordering::Equal))
            }
            Comparison::GreaterThan => compare(actual, &self.value) == Some(Ordering::Greater),
            Comparison::GreaterThanOrEqual => {
                matches!(compare(actual, &self.value), Some(Ordering::Greater | Ordering::Equal))
            }
            Comparison::ArrayContains => actual
                .as_array()
                .is_some_and(|items| items.contains(&self.value)),
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Whether a transaction is currently open on a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum TransactionState {
    Idle,
    InTransaction,
}

/// Document store over SQLite with at most one live transaction at a time.
#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
    gate: Arc<Mutex<()>>,
    operations_limit: usize,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool, operations_limit: usize) -> Self {
        Self {
            pool,
            gate: Arc::new(Mutex::new(())),
            operations_limit,
        }
    }

    /// Maximum read+write operations a single transaction may issue.
    pub fn operations_limit(&self) -> usize {
        self.operations_limit
    }

    #[allow(dead_code)]
    pub fn state(&self) -> TransactionState {
        match self.gate.try_lock() {
            Ok(_) => TransactionState::Idle,
            Err(_) => TransactionState::InTransaction,
        }
    }

    /// Open a transaction, waiting for any other live transaction to finish first.
    ///
    /// The store returns to [`TransactionState::Idle`] when the handle is committed,
    /// rolled back, or dropped.
    pub async fn begin(&self) -> Result<StoreTransaction, AppError> {
        let guard = self.gate.clone().lock_owned().await;
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::store("Failed to run a transaction", e))?;
        tracing::debug!("Transaction started");

        Ok(StoreTransaction {
            tx,
            operations: 0,
            limit: self.operations_limit,
            _guard: guard,
        })
    }

    /// Get a document, or `None` if no such document exists.
    pub async fn get_doc(&self, path: &StorePath, id: &str) -> Result<Option<Value>, AppError> {
        fetch_doc(&self.pool, path, id).await
    }

    /// Get every document stored under `path` that matches all `filters`, ordered by id.
    pub async fn get_collection(
        &self,
        path: &StorePath,
        filters: &[QueryFilter],
    ) -> Result<Vec<Value>, AppError> {
        fetch_collection(&self.pool, path, filters).await
    }

    /// Create a document, generating an id when none is given. Fails if it already exists.
    #[allow(dead_code)]
    pub async fn create_doc(
        &self,
        path: &StorePath,
        id: Option<&str>,
        data: &Value,
    ) -> Result<String, AppError> {
        insert_doc(&self.pool, path, id, data).await
    }

    /// Create or replace a document.
    #[allow(dead_code)]
    pub async fn set_doc(&self, path: &StorePath, id: &str, data: &Value) -> Result<(), AppError> {
        upsert_doc(&self.pool, path, id, data).await
    }

    /// Merge `data` into an existing document. Fails if it does not exist.
    #[allow(dead_code)]
    pub async fn update_doc(&self, path: &StorePath, id: &str, data: &Value) -> Result<(), AppError> {
        patch_doc(&self.pool, path, id, data).await
    }

    /// Delete a document. Succeeds even if there was nothing to delete.
    #[allow(dead_code)]
    pub async fn delete_doc(&self, path: &StorePath, id: &str) -> Result<(), AppError> {
        remove_doc(&self.pool, path, id).await
    }

    /// Delete a document together with every document nested under it.
    #[allow(dead_code)]
    pub async fn delete_doc_recursively(&self, path: &StorePath, id: &str) -> Result<u64, AppError> {
        remove_doc_recursively(&self.pool, path, id).await
    }
}

/// A live transaction. All operations issued through it commit atomically.
pub struct StoreTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
    operations: usize,
    limit: usize,
    _guard: OwnedMutexGuard<()>,
}

impl StoreTransaction {
    /// Operations issued so far.
    #[allow(dead_code)]
    pub fn operations(&self) -> usize {
        self.operations
    }

    fn count_operation(&mut self) -> Result<(), AppError> {
        if self.operations >= self.limit {
            return Err(AppError::TransactionLimit { limit: self.limit });
        }
        self.operations += 1;
        Ok(())
    }

    #[allow(dead_code)]
    pub async fn get_doc(&mut self, path: &StorePath, id: &str) -> Result<Option<Value>, AppError> {
        self.count_operation()?;
        fetch_doc(&mut *self.tx, path, id).await
    }

    #[allow(dead_code)]
    pub async fn get_collection(
        &mut self,
        path: &StorePath,
        filters: &[QueryFilter],
    ) -> Result<Vec<Value>, AppError> {
        self.count_operation()?;
        fetch_collection(&mut *self.tx, path, filters).await
    }

    #[allow(dead_code)]
    pub async fn create_doc(
        &mut self,
        path: &StorePath,
        id: Option<&str>,
        data: &Value,
    ) -> Result<String, AppError> {
        self.count_operation()?;
        insert_doc(&mut *self.tx, path, id, data).await
    }

    pub async fn set_doc(&mut self, path: &StorePath, id: &str, data: &Value) -> Result<(), AppError> {
        self.count_operation()?;
        upsert_doc(&mut *self.tx, path, id, data).await
    }

    #[allow(dead_code)]
    pub async fn update_doc(&mut self, path: &StorePath, id: &str, data: &Value) -> Result<(), AppError> {
        self.count_operation()?;
        patch_doc(&mut *self.tx, path, id, data).await
    }

    pub async fn delete_doc(&mut self, path: &StorePath, id: &str) -> Result<(), AppError> {
        self.count_operation()?;
        remove_doc(&mut *self.tx, path, id).await
    }

    pub async fn delete_doc_recursively(&mut self, path: &StorePath, id: &str) -> Result<u64, AppError> {
        self.count_operation()?;
        remove_doc_recursively(&mut *self.tx, path, id).await
    }

    pub async fn commit(self) -> Result<(), AppError> {
        let operations = self.operations;
        self.tx
            .commit()
            .await
            .map_err(|e| AppError::store("Failed to commit a transaction", e))?;
        tracing::debug!(operations, "Transaction committed");
        Ok(())
    }

    #[allow(dead_code)]
    pub async fn rollback(self) -> Result<(), AppError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| AppError::store("Failed to roll back a transaction", e))?;
        tracing::debug!("Transaction rolled back");
        Ok(())
    }
}

// Statement helpers shared by the pool and transaction paths

fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<Value, AppError> {
    let data: String = row.get("data");
    Ok(serde_json::from_str(&data)?)
}

async fn fetch_doc<'e, E: SqliteExecutor<'e>>(
    executor: E,
    path: &StorePath,
    id: &str,
) -> Result<Option<Value>, AppError> {
    let row = sqlx::query("SELECT data FROM documents WHERE collection_path = ? AND id = ?")
        .bind(path.to_string())
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(|e| {
            AppError::store(
                format!("Failed to fetch document with id \"{}\" from path \"{}\"", id, path),
                e,
            )
        })?;

    row.as_ref().map(decode).transpose()
}

async fn fetch_collection<'e, E: SqliteExecutor<'e>>(
    executor: E,
    path: &StorePath,
    filters: &[QueryFilter],
) -> Result<Vec<Value>, AppError> {
    let rows = sqlx::query("SELECT data FROM documents WHERE collection_path = ? ORDER BY id")
        .bind(path.to_string())
        .fetch_all(executor)
        .await
        .map_err(|e| AppError::store(format!("Failed to get documents from collection \"{}\"", path), e))?;

    let mut documents = Vec::with_capacity(rows.len());
    for row in &rows {
        let document = decode(row)?;
        if filters.iter().all(|filter| filter.matches(&document)) {
            documents.push(document);
        }
    }
    Ok(documents)
}

#[allow(dead_code)]
async fn insert_doc<'e, E: SqliteExecutor<'e>>(
    executor: E,
    path: &StorePath,
    id: Option<&str>,
    data: &Value,
) -> Result<String, AppError> {
    let id = id
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let now = Utc::now().to_rfc3339();

    let result = sqlx::query(
        "INSERT INTO documents (collection_path, id, data, updated_at) VALUES (?, ?, ?, ?) ON CONFLICT(collection_path, id) DO NOTHING",
    )
    .bind(path.to_string())
    .bind(&id)
    .bind(serde_json::to_string(data)?)
    .bind(&now)
    .execute(executor)
    .await
    .map_err(|e| {
        AppError::store(
            format!("Failed to create document with id \"{}\" in path \"{}\"", id, path),
            e,
        )
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::AlreadyExists(format!(
            "Document with id \"{}\" already exists in path \"{}\"",
            id, path
        )));
    }
    Ok(id)
}

async fn upsert_doc<'e, E: SqliteExecutor<'e>>(
    executor: E,
    path: &StorePath,
    id: &str,
    data: &Value,
) -> Result<(), AppError> {
    let now = Utc::now().to_rfc3339();

    // Unchanged documents keep their previous timestamp
    sqlx::query(
        r#"INSERT INTO documents (collection_path, id, data, updated_at) VALUES (?, ?, ?, ?)
           ON CONFLICT(collection_path, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
           WHERE documents.data <> excluded.data"#,
    )
    .bind(path.to_string())
    .bind(id)
    .bind(serde_json::to_string(data)?)
    .bind(&now)
    .execute(executor)
    .await
    .map_err(|e| {
        AppError::store(
            format!("Failed to set document with id \"{}\" in path \"{}\"", id, path),
            e,
        )
    })?;

    Ok(())
}

#[allow(dead_code)]
async fn patch_doc<'e, E: SqliteExecutor<'e>>(
    executor: E,
    path: &StorePath,
    id: &str,
    data: &Value,
) -> Result<(), AppError> {
    let now = Utc::now().to_rfc3339();

    let result = sqlx::query(
        "UPDATE documents SET data = json_patch(data, ?), updated_at = ? WHERE collection_path = ? AND id = ?",
    )
    .bind(serde_json::to_string(data)?)
    .bind(&now)
    .bind(path.to_string())
    .bind(id)
    .execute(executor)
    .await
    .map_err(|e| {
        AppError::store(
            format!("Failed to update the document with id \"{}\" in path \"{}\"", id, path),
            e,
        )
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Document with id \"{}\" not found in path \"{}\"",
            id, path
        )));
    }
    Ok(())
}

async fn remove_doc<'e, E: SqliteExecutor<'e>>(
    executor: E,
    path: &StorePath,
    id: &str,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM documents WHERE collection_path = ? AND id = ?")
        .bind(path.to_string())
        .bind(id)
        .execute(executor)
        .await
        .map_err(|e| {
            AppError::store(
                format!("Failed to delete the document with id \"{}\" in path \"{}\"", id, path),
                e,
            )
        })?;

    Ok(())
}

async fn remove_doc_recursively<'e, E: SqliteExecutor<'e>>(
    executor: E,
    path: &StorePath,
    id: &str,
) -> Result<u64, AppError> {
    let nested_prefix = format!("{}/{}/", path, id);

    let result = sqlx::query(
        r#"DELETE FROM documents
           WHERE (collection_path = ? AND id = ?)
              OR substr(collection_path, 1, length(?)) = ?"#,
    )
    .bind(path.to_string())
    .bind(id)
    .bind(&nested_prefix)
    .bind(&nested_prefix)
    .execute(executor)
    .await
    .map_err(|e| {
        AppError::store(
            format!(
                "Failed to recursively delete the document with id \"{}\" in path \"{}\"",
                id, path
            ),
            e,
        )
    })?;

    Ok(result.rows_affected())
}

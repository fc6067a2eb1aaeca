//! Dependency container, built once at process start.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::config::Config;
use crate::db::{self, DocumentStore};
use crate::errors::AppError;
use crate::gateways::{FileSystemGateway, ProcessShell, ShellGateway};
use crate::repositories::{
    GitRepository, LocalCollectionsRepository, MemosRepository, StoredCollectionsRepository,
};
use crate::sync::{GitRevisionDiffer, SyncCollections};

/// Shared collaborators from which every repository and use case is built.
///
/// The document store is opened on first use, so commands that only touch git
/// or the collection files never create a database.
#[derive(Clone)]
pub struct Provider {
    pub config: Arc<Config>,
    store: Arc<OnceCell<DocumentStore>>,
    shell: Arc<dyn ShellGateway>,
    collections_fs: FileSystemGateway,
}

impl Provider {
    /// Wire the real process shell. The database is not opened yet.
    pub fn new(config: Config) -> Self {
        let shell: Arc<dyn ShellGateway> = Arc::new(ProcessShell::new(config.repo_dir.clone()));
        Self::build(config, OnceCell::new(), shell)
    }

    pub fn with_collaborators(config: Config, store: DocumentStore, shell: Arc<dyn ShellGateway>) -> Self {
        Self::build(config, OnceCell::new_with(Some(store)), shell)
    }

    fn build(config: Config, store: OnceCell<DocumentStore>, shell: Arc<dyn ShellGateway>) -> Self {
        let collections_fs = FileSystemGateway::new(config.collections_dir.clone());
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            shell,
            collections_fs,
        }
    }

    /// The document store, opening the database on first call.
    pub async fn document_store(&self) -> Result<DocumentStore, AppError> {
        let store = self
            .store
            .get_or_try_init(|| open_store(&self.config))
            .await?;
        Ok(store.clone())
    }

    pub fn git_repository(&self) -> GitRepository {
        GitRepository::new(self.shell.clone())
    }

    pub fn local_collections_repository(&self) -> LocalCollectionsRepository {
        LocalCollectionsRepository::new(self.collections_fs.clone())
    }

    pub async fn stored_collections_repository(&self) -> Result<StoredCollectionsRepository, AppError> {
        Ok(StoredCollectionsRepository::new(self.document_store().await?))
    }

    pub async fn memos_repository(&self) -> Result<MemosRepository, AppError> {
        Ok(MemosRepository::new(self.document_store().await?))
    }

    pub fn revision_differ(&self) -> GitRevisionDiffer {
        GitRevisionDiffer::new(self.git_repository(), self.config.collections_segment.clone())
    }

    pub async fn sync_collections(&self) -> Result<SyncCollections, AppError> {
        Ok(SyncCollections::new(
            Arc::new(self.revision_differ()),
            self.local_collections_repository(),
            self.stored_collections_repository().await?,
            self.memos_repository().await?,
        ))
    }
}

async fn open_store(config: &Config) -> Result<DocumentStore, AppError> {
    if let Some(parent) = config.db_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::filesystem("Failed to create the database directory", parent, e))?;
    }

    let pool = db::init_database(&config.db_path).await?;
    tracing::debug!(path = ?config.db_path, "Document store opened");
    Ok(DocumentStore::new(pool, config.transaction_limit))
}
